/// Local embedding generation backed by fastembed models.
///
/// Text goes through a sentence-transformer, images through a CLIP vision
/// encoder; both run in-process, so the only failure modes are model
/// initialization and inference itself.
use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{
    ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions, TextEmbedding,
    EmbeddingModel as FastEmbedModel,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::providers::{EmbeddingProvider, ProviderError, ProviderResult};
use crate::domain::value_objects::EmbeddingVector;

pub const TEXT_DIMENSION: usize = 384;
pub const IMAGE_DIMENSION: usize = 512;

/// Dual-model embedding service: MiniLM for text, CLIP for images
pub struct FastEmbedProvider {
    text_model: Arc<Mutex<TextEmbedding>>,
    image_model: Arc<Mutex<ImageEmbedding>>,
}

impl FastEmbedProvider {
    pub async fn new() -> Result<Self> {
        info!("Initializing fastembed text and image models");

        let text_model = TextEmbedding::try_new(
            InitOptions::new(FastEmbedModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .context("Failed to initialize text embedding model")?;

        let image_model = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_show_download_progress(true),
        )
        .context("Failed to initialize image embedding model")?;

        info!("fastembed models initialized");

        Ok(FastEmbedProvider {
            text_model: Arc::new(Mutex::new(text_model)),
            image_model: Arc::new(Mutex::new(image_model)),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    fn text_dimension(&self) -> usize {
        TEXT_DIMENSION
    }

    fn image_dimension(&self) -> usize {
        IMAGE_DIMENSION
    }

    async fn embed_text(&self, text: &str) -> ProviderResult<EmbeddingVector> {
        debug!(text_length = text.len(), "Embedding text");

        let mut model = self.text_model.lock().await;
        let embeddings = model.embed(vec![text], None).map_err(|e| {
            ProviderError::InvalidResponse(format!("Text embedding failed: {}", e))
        })?;

        let values = embeddings.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("Text model returned no embedding".into())
        })?;

        EmbeddingVector::new(values)
            .map_err(|e| ProviderError::InvalidResponse(format!("Invalid embedding: {}", e)))
    }

    async fn embed_image(&self, image_path: &Path) -> ProviderResult<EmbeddingVector> {
        debug!(path = %image_path.display(), "Embedding image");

        let mut model = self.image_model.lock().await;
        let embeddings = model.embed(vec![image_path], None).map_err(|e| {
            ProviderError::InvalidResponse(format!("Image embedding failed: {}", e))
        })?;

        let values = embeddings.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("Image model returned no embedding".into())
        })?;

        EmbeddingVector::new(values)
            .map_err(|e| ProviderError::InvalidResponse(format!("Invalid embedding: {}", e)))
    }

    async fn health(&self) -> ProviderResult<()> {
        // Models are in-process: reachable once constructed
        Ok(())
    }
}
