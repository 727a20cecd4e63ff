//! Hybrid image retrieval and classification engine.
//!
//! Images are ingested through a multi-signal pipeline: a multimodal
//! embedding of the pixels plus four description angles (basic, detailed,
//! emotional, technical), each described by a vision-language model and
//! embedded as text. Both signal families land in a dual-collection vector
//! store, queries fuse them with fixed weights, and every image is labeled
//! by a two-method zero-shot classifier with a consensus policy.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::dto::{
    HealthResponse, RankedHit, SearchMode, SearchResponse, StatsResponse, UploadRequest,
    UploadResponse,
};
pub use application::providers::{EmbeddingProvider, ProviderError, VisionModel};
pub use application::services::{
    ClassificationVerdict, HybridEmbeddingGenerator, ZeroShotClassifier,
};
pub use application::use_cases::{
    CheckHealth, ClassifyImage, ClearStore, GetStats, QueryError, RetrievalEngine, UploadError,
    UploadImage,
};
pub use config::EngineConfig;
pub use infrastructure::store::DualVectorStore;
