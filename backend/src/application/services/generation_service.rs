/// Hybrid embedding generation for uploaded images.
///
/// One upload produces five artifacts: a multimodal image vector plus four
/// description angles, each embedded into a text vector. All five external
/// call chains fan out concurrently and join before anything is handed to
/// the store; if any chain fails permanently the whole operation fails and
/// nothing is committed, so the store can never hold an image vector without
/// its text vectors or the reverse.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::providers::{EmbeddingProvider, ProviderError, VisionModel};
use crate::application::services::retry::call_with_retry;
use crate::config::GenerationConfig;
use crate::domain::base::DomainError;
use crate::domain::value_objects::{ContentFingerprint, DescriptionType, EmbeddingVector};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not read image {path}: {source}")]
    ImageRead {
        path: String,
        source: std::io::Error,
    },

    #[error("External service failed: {0}")]
    ExternalService(#[from] ProviderError),

    #[error("Generated vector rejected: {0}")]
    Domain(#[from] DomainError),
}

/// One fully generated description angle
#[derive(Debug, Clone)]
pub struct GeneratedDescription {
    pub description_type: DescriptionType,
    pub text: String,
    pub confidence: f32,
    pub vector: EmbeddingVector,
    pub generation_time: DateTime<Utc>,
}

/// Everything generated for a single image, keyed by its content fingerprint
#[derive(Debug, Clone)]
pub struct GeneratedBundle {
    pub fingerprint: ContentFingerprint,
    pub image_vector: EmbeddingVector,
    /// One entry per description type, in `DescriptionType::ALL` order
    pub descriptions: Vec<GeneratedDescription>,
}

impl GeneratedBundle {
    pub fn description(&self, description_type: DescriptionType) -> Option<&GeneratedDescription> {
        self.descriptions
            .iter()
            .find(|d| d.description_type == description_type)
    }
}

/// Orchestrates description generation and embedding for one image
pub struct HybridEmbeddingGenerator<E, V> {
    embeddings: Arc<E>,
    vision: Arc<V>,
    config: GenerationConfig,
    cache: Mutex<HashMap<ContentFingerprint, Arc<GeneratedBundle>>>,
}

impl<E: EmbeddingProvider, V: VisionModel> HybridEmbeddingGenerator<E, V> {
    pub fn new(embeddings: Arc<E>, vision: Arc<V>, config: GenerationConfig) -> Self {
        HybridEmbeddingGenerator {
            embeddings,
            vision,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Generate (or fetch from cache) the full artifact bundle for an image.
    ///
    /// Identical bytes reuse the cached bundle without touching the external
    /// services.
    pub async fn generate(
        &self,
        image_path: &Path,
    ) -> Result<Arc<GeneratedBundle>, GenerationError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|source| GenerationError::ImageRead {
                path: image_path.display().to_string(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(GenerationError::Validation(format!(
                "Image file is empty: {}",
                image_path.display()
            )));
        }

        let fingerprint = ContentFingerprint::from_bytes(&bytes);
        if let Some(cached) = self.cache.lock().get(&fingerprint).cloned() {
            debug!(%fingerprint, "Reusing cached generation bundle");
            return Ok(cached);
        }

        info!(%fingerprint, path = %image_path.display(), "Generating embeddings and descriptions");

        // Fan out: the multimodal branch and the four describe -> embed
        // chains run concurrently; try_join! is the fan-in barrier.
        let image_branch = async {
            call_with_retry("embed_image", &self.config, || {
                self.embeddings.embed_image(image_path)
            })
            .await
            .map_err(GenerationError::from)
        };

        let (image_vector, basic, detailed, emotional, technical) = tokio::try_join!(
            image_branch,
            self.describe_and_embed(image_path, DescriptionType::Basic),
            self.describe_and_embed(image_path, DescriptionType::Detailed),
            self.describe_and_embed(image_path, DescriptionType::Emotional),
            self.describe_and_embed(image_path, DescriptionType::Technical),
        )?;

        if image_vector.dimension_count() != self.embeddings.image_dimension() {
            return Err(DomainError::DimensionMismatch {
                expected: self.embeddings.image_dimension(),
                actual: image_vector.dimension_count(),
            }
            .into());
        }

        let bundle = Arc::new(GeneratedBundle {
            fingerprint: fingerprint.clone(),
            image_vector,
            descriptions: vec![basic, detailed, emotional, technical],
        });

        self.cache.lock().insert(fingerprint, bundle.clone());
        Ok(bundle)
    }

    async fn describe_and_embed(
        &self,
        image_path: &Path,
        description_type: DescriptionType,
    ) -> Result<GeneratedDescription, GenerationError> {
        let generated = call_with_retry("describe", &self.config, || {
            self.vision.describe(image_path, description_type)
        })
        .await?;

        if generated.text.trim().is_empty() {
            return Err(GenerationError::ExternalService(
                ProviderError::InvalidResponse(format!(
                    "Vision model returned an empty {} description",
                    description_type
                )),
            ));
        }

        let vector = call_with_retry("embed_text", &self.config, || {
            self.embeddings.embed_text(&generated.text)
        })
        .await?;

        if vector.dimension_count() != self.embeddings.text_dimension() {
            return Err(DomainError::DimensionMismatch {
                expected: self.embeddings.text_dimension(),
                actual: vector.dimension_count(),
            }
            .into());
        }

        Ok(GeneratedDescription {
            description_type,
            text: generated.text,
            confidence: generated.confidence,
            vector,
            generation_time: Utc::now(),
        })
    }

    /// Number of cached bundles (diagnostics only)
    pub fn cached_bundles(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::providers::{
        DirectClassification, GeneratedText, ProviderResult,
    };
    use crate::domain::value_objects::Category;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingEmbedder {
        text_calls: AtomicUsize,
        image_calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            CountingEmbedder {
                text_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn text_dimension(&self) -> usize {
            4
        }

        fn image_dimension(&self) -> usize {
            4
        }

        async fn embed_text(&self, text: &str) -> ProviderResult<EmbeddingVector> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            let seed = text.len() as f32;
            Ok(EmbeddingVector::new(vec![seed, 1.0, 0.0, 0.0]).unwrap())
        }

        async fn embed_image(&self, _image_path: &Path) -> ProviderResult<EmbeddingVector> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingVector::new(vec![0.0, 0.0, 1.0, 1.0]).unwrap())
        }

        async fn health(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    /// Vision mock that fails the first `failures` describe calls
    struct FlakyVision {
        remaining_failures: AtomicUsize,
        permanent: bool,
    }

    impl FlakyVision {
        fn reliable() -> Self {
            FlakyVision {
                remaining_failures: AtomicUsize::new(0),
                permanent: false,
            }
        }

        fn transient(failures: usize) -> Self {
            FlakyVision {
                remaining_failures: AtomicUsize::new(failures),
                permanent: false,
            }
        }

        fn broken() -> Self {
            FlakyVision {
                remaining_failures: AtomicUsize::new(usize::MAX),
                permanent: true,
            }
        }
    }

    #[async_trait]
    impl VisionModel for FlakyVision {
        async fn describe(
            &self,
            _image_path: &Path,
            description_type: DescriptionType,
        ) -> ProviderResult<GeneratedText> {
            let remaining = self.remaining_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                if !self.permanent {
                    self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                }
                let status = if self.permanent { 401 } else { 503 };
                return Err(ProviderError::Api {
                    status,
                    message: "injected failure".into(),
                });
            }
            Ok(GeneratedText {
                text: format!("a {} view of the scene", description_type),
                confidence: 0.9,
            })
        }

        async fn classify(
            &self,
            _image_path: &Path,
            categories: &[Category],
        ) -> ProviderResult<DirectClassification> {
            Ok(DirectClassification {
                category: categories[0].clone(),
                confidence: 0.9,
            })
        }

        async fn health(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn fast_config() -> GenerationConfig {
        GenerationConfig {
            call_timeout: Duration::from_secs(5),
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn temp_image(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_generates_all_five_artifacts() {
        let embedder = Arc::new(CountingEmbedder::new());
        let generator = HybridEmbeddingGenerator::new(
            embedder.clone(),
            Arc::new(FlakyVision::reliable()),
            fast_config(),
        );
        let image = temp_image(b"image-bytes");

        let bundle = generator.generate(image.path()).await.unwrap();

        assert_eq!(bundle.image_vector.dimension_count(), 4);
        assert_eq!(bundle.descriptions.len(), 4);
        for (description, expected_type) in
            bundle.descriptions.iter().zip(DescriptionType::ALL)
        {
            assert_eq!(description.description_type, expected_type);
            assert!(!description.text.is_empty());
            assert_eq!(description.vector.dimension_count(), 4);
        }
        assert_eq!(embedder.image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.text_calls.load(Ordering::SeqCst), 4);
        assert!(bundle
            .description(DescriptionType::Emotional)
            .is_some_and(|d| d.text.contains("emotional")));
    }

    #[tokio::test]
    async fn test_identical_bytes_hit_the_cache() {
        let embedder = Arc::new(CountingEmbedder::new());
        let generator = HybridEmbeddingGenerator::new(
            embedder.clone(),
            Arc::new(FlakyVision::reliable()),
            fast_config(),
        );
        let first = temp_image(b"same-content");
        let second = temp_image(b"same-content");

        let a = generator.generate(first.path()).await.unwrap();
        let b = generator.generate(second.path()).await.unwrap();

        assert_eq!(a.fingerprint, b.fingerprint);
        // No further provider calls for the second generation
        assert_eq!(embedder.image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.text_calls.load(Ordering::SeqCst), 4);
        assert_eq!(generator.cached_bundles(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let generator = HybridEmbeddingGenerator::new(
            Arc::new(CountingEmbedder::new()),
            Arc::new(FlakyVision::transient(1)),
            fast_config(),
        );
        let image = temp_image(b"flaky-image");

        let bundle = generator.generate(image.path()).await.unwrap();
        assert_eq!(bundle.descriptions.len(), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_aborts_everything() {
        let generator = HybridEmbeddingGenerator::new(
            Arc::new(CountingEmbedder::new()),
            Arc::new(FlakyVision::broken()),
            fast_config(),
        );
        let image = temp_image(b"doomed-image");

        let result = generator.generate(image.path()).await;
        assert!(matches!(result, Err(GenerationError::ExternalService(_))));
        // Nothing cached for a failed generation
        assert_eq!(generator.cached_bundles(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let generator = HybridEmbeddingGenerator::new(
            Arc::new(CountingEmbedder::new()),
            Arc::new(FlakyVision::reliable()),
            fast_config(),
        );
        let image = temp_image(b"");

        let result = generator.generate(image.path()).await;
        assert!(matches!(result, Err(GenerationError::Validation(_))));
    }
}
