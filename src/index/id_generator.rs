//! id_generator.rs
//!
//! Deterministic ID and content-hash helpers for index nodes.
//! - Node IDs: UUIDv5 derived from a canonical node key
//! - Content hash: SHA-256 hex of the node text

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Canonicalizes the identity of a node: source document, position, contents.
pub fn canonical_node_key(doc_id: &str, chunk_index: usize, hash: &str) -> String {
    format!("doc={}|chunk={}|hash={}", doc_id.trim(), chunk_index, hash)
}

/// Stable UUIDv5 node ID derived from the canonical key.
///
/// The URL namespace is used only as a fixed seed; the key carries the identity.
pub fn node_id(doc_id: &str, chunk_index: usize, hash: &str) -> String {
    let key = canonical_node_key(doc_id, chunk_index, hash);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Identifier for one index build, derived from its node ids and build time.
pub fn index_id<'a, I>(node_ids: I, built_at: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut key = format!("built_at={built_at}");
    for id in node_ids {
        key.push('|');
        key.push_str(id);
    }
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"TEXT\0");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
