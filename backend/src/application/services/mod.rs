pub mod classification_service;
pub mod generation_service;
pub mod retry;

pub use classification_service::{
    ClassificationError, ClassificationMethod, ClassificationVerdict, MethodClassification,
    ZeroShotClassifier,
};
pub use generation_service::{
    GeneratedBundle, GeneratedDescription, GenerationError, HybridEmbeddingGenerator,
};
