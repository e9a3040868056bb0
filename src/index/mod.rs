pub mod id_generator;
pub mod lifecycle;
pub mod storage;
pub mod vector_index;
