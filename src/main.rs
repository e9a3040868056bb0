// src/main.rs
//! Ask questions about the documents in `data/`:
//! - read endpoint/key/version from the environment (`.env` supported)
//! - build the chat + embedding clients
//! - load the index persisted in `./vectors`, or build and persist it
//! - answer questions until Ctrl+C
//!
//! Run: `cargo run` (no flags). `RUST_LOG=lindex=debug` for more detail.

mod client;
mod config;
mod index;
mod ingest;
mod query_engine;
mod terminal;
mod transform;

use std::io;
use std::pin::pin;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::ModelClients;
use crate::config::Settings;
use crate::index::lifecycle::IndexManager;
use crate::ingest::dir_reader::DirectoryReader;
use crate::query_engine::RetrieverQueryEngine;
use crate::terminal::{FAREWELL, PromptError};

// -------- hardcoded config --------

const PERSIST_DIR: &str = "./vectors";
const DATA_DIR: &str = "data/";
const SIMILARITY_TOP_K: usize = 2;

// ----------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lindex=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let settings = Settings::from_env()?;
    let clients = ModelClients::from_settings(&settings).context("failed to build model clients")?;

    // one listener for the whole run; a signal between prompts is not lost
    let mut interrupt = pin!(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    });
    let mut prompter = terminal::console_prompter();
    let mut manager = IndexManager::new(PERSIST_DIR);

    let remove_existing = if manager.needs_confirmation()? {
        match terminal::confirm_removal(&mut prompter, manager.persist_dir(), interrupt.as_mut()).await {
            Ok(decision) => decision,
            Err(PromptError::Interrupted) => {
                println!("{FAREWELL}");
                return Ok(());
            }
            Err(e) => return Err(e).context("removal prompt failed"),
        }
    } else {
        false
    };

    let reader = DirectoryReader::new(DATA_DIR);
    let index = manager
        .initialize(remove_existing, &reader, &clients.embedder)
        .await
        .with_context(|| format!("failed to prepare index in {PERSIST_DIR}"))?;
    tracing::info!(state = ?manager.state(), nodes = index.node_count(), "index ready");

    let engine = RetrieverQueryEngine::new(&index, &clients.embedder, &clients.llm)
        .with_top_k(SIMILARITY_TOP_K);
    terminal::query_loop(&mut prompter, &engine, &mut io::stdout(), interrupt).await?;

    Ok(())
}
