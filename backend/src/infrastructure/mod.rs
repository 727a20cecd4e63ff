pub mod embeddings;
pub mod persistence;
pub mod store;
pub mod vision;
