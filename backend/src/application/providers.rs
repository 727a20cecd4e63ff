/// Provider ports consumed by the core engine.
///
/// The embedding and vision-language services are external collaborators;
/// the core only depends on these traits and on the transient/permanent
/// split of their errors.
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::value_objects::{Category, DescriptionType, EmbeddingVector};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Could not reach provider: {0}")]
    Unreachable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Transient errors are worth retrying on the generation path; anything
    /// else fails the operation immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::Unreachable(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::InvalidResponse(_) => false,
            ProviderError::Io(_) => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Embedding API: a text vector from a string, a multimodal vector from an
/// image file
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of vectors produced by `embed_text`
    fn text_dimension(&self) -> usize;

    /// Dimension of vectors produced by `embed_image`
    fn image_dimension(&self) -> usize;

    async fn embed_text(&self, text: &str) -> ProviderResult<EmbeddingVector>;

    async fn embed_image(&self, image_path: &Path) -> ProviderResult<EmbeddingVector>;

    /// Cheap reachability probe for the health endpoint
    async fn health(&self) -> ProviderResult<()>;
}

/// A generated natural-language description of an image
#[derive(Debug, Clone)]
pub struct GeneratedText {
    pub text: String,
    pub confidence: f32,
}

/// The direct strategy's verdict from the vision-language model
#[derive(Debug, Clone)]
pub struct DirectClassification {
    pub category: Category,
    pub confidence: f32,
}

/// Vision-language API: multi-angle descriptions and fixed-taxonomy
/// classification
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(
        &self,
        image_path: &Path,
        description_type: DescriptionType,
    ) -> ProviderResult<GeneratedText>;

    async fn classify(
        &self,
        image_path: &Path,
        categories: &[Category],
    ) -> ProviderResult<DirectClassification>;

    /// Cheap reachability probe for the health endpoint
    async fn health(&self) -> ProviderResult<()>;
}
