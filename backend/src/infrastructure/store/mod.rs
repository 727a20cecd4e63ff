/// In-memory dual-collection vector store
mod dual_store;

pub use dual_store::{DualVectorStore, ScoredImage, ScoredText, StoreStats};
