/// Classify-only: run the full consensus pipeline for an image without
/// storing anything.
///
/// Generation goes through the shared fingerprint cache, so classifying an
/// image and later uploading it does not repeat the provider calls.
use std::sync::Arc;
use thiserror::Error;

use crate::application::providers::{EmbeddingProvider, VisionModel};
use crate::application::services::{
    ClassificationError, ClassificationVerdict, GenerationError, HybridEmbeddingGenerator,
    ZeroShotClassifier,
};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

pub struct ClassifyImage<E, V> {
    generator: Arc<HybridEmbeddingGenerator<E, V>>,
    classifier: Arc<ZeroShotClassifier<V>>,
}

impl<E: EmbeddingProvider, V: VisionModel> ClassifyImage<E, V> {
    pub fn new(
        generator: Arc<HybridEmbeddingGenerator<E, V>>,
        classifier: Arc<ZeroShotClassifier<V>>,
    ) -> Self {
        ClassifyImage {
            generator,
            classifier,
        }
    }

    pub async fn execute(
        &self,
        image_path: &std::path::Path,
    ) -> Result<ClassificationVerdict, ClassifyError> {
        let bundle = self.generator.generate(image_path).await?;
        let verdict = self
            .classifier
            .classify(image_path, &bundle.image_vector)
            .await?;
        Ok(verdict)
    }
}
