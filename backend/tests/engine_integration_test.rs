/// End-to-end engine tests with deterministic in-process providers.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use iris::application::dto::UploadRequest;
use iris::application::providers::{
    DirectClassification, GeneratedText, ProviderResult,
};
use iris::application::use_cases::QueryError;
use iris::config::EngineConfig;
use iris::domain::value_objects::{Category, DescriptionType, EmbeddingVector};
use iris::{
    CheckHealth, ClearStore, DualVectorStore, EmbeddingProvider, GetStats,
    HybridEmbeddingGenerator, RetrievalEngine, UploadImage, VisionModel, ZeroShotClassifier,
};

const DIM: usize = 4;

/// Maps a few known subjects onto orthogonal axes so similarities are exact
struct KeywordEmbedder;

fn subject_axis(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    if lower.contains("tripod") {
        vec![0.0, 0.0, 1.0, 0.0]
    } else if lower.contains("dog") {
        vec![1.0, 0.0, 0.0, 0.0]
    } else if lower.contains("skyline") {
        vec![0.0, 1.0, 0.0, 0.0]
    } else {
        vec![0.0, 0.0, 0.0, 1.0]
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn text_dimension(&self) -> usize {
        DIM
    }

    fn image_dimension(&self) -> usize {
        DIM
    }

    async fn embed_text(&self, text: &str) -> ProviderResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(subject_axis(text)).unwrap())
    }

    async fn embed_image(&self, image_path: &Path) -> ProviderResult<EmbeddingVector> {
        let name = image_path.to_string_lossy();
        Ok(EmbeddingVector::new(subject_axis(&name)).unwrap())
    }

    async fn health(&self) -> ProviderResult<()> {
        Ok(())
    }
}

/// Describes and classifies by file name, one distinct text per angle
struct SubjectVision;

#[async_trait]
impl VisionModel for SubjectVision {
    async fn describe(
        &self,
        image_path: &Path,
        description_type: DescriptionType,
    ) -> ProviderResult<GeneratedText> {
        let subject = if image_path.to_string_lossy().contains("dog") {
            "dog"
        } else {
            "skyline"
        };
        let text = match description_type {
            DescriptionType::Basic => format!("a {} in daylight", subject),
            DescriptionType::Detailed => format!("a close view of a {} with rich detail", subject),
            DescriptionType::Emotional => format!("a calm scene with a {}", subject),
            DescriptionType::Technical => format!("tripod shot of a {}", subject),
        };
        Ok(GeneratedText {
            text,
            confidence: 0.9,
        })
    }

    async fn classify(
        &self,
        image_path: &Path,
        _categories: &[Category],
    ) -> ProviderResult<DirectClassification> {
        let (name, confidence) = if image_path.to_string_lossy().contains("dog") {
            ("animals", 0.9)
        } else {
            ("architecture", 0.85)
        };
        Ok(DirectClassification {
            category: Category::new(name).unwrap(),
            confidence,
        })
    }

    async fn health(&self) -> ProviderResult<()> {
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    dir_path: PathBuf,
    store: Arc<DualVectorStore>,
    upload: UploadImage<KeywordEmbedder, SubjectVision>,
    engine: RetrievalEngine<KeywordEmbedder>,
}

fn harness() -> Harness {
    let config = EngineConfig::default();
    let embeddings = Arc::new(KeywordEmbedder);
    let vision = Arc::new(SubjectVision);
    let store = Arc::new(DualVectorStore::new(DIM, DIM));

    let generator = Arc::new(HybridEmbeddingGenerator::new(
        embeddings.clone(),
        vision.clone(),
        config.generation.clone(),
    ));
    let classifier = Arc::new(ZeroShotClassifier::new(
        vision,
        store.clone(),
        config.classifier.clone(),
        config.generation.clone(),
    ));
    let upload = UploadImage::new(generator, classifier, store.clone());
    let engine = RetrievalEngine::new(embeddings, store.clone(), config.retrieval);

    let dir = tempfile::tempdir().unwrap();
    let dir_path = dir.path().to_path_buf();
    Harness {
        _dir: dir,
        dir_path,
        store,
        upload,
        engine,
    }
}

impl Harness {
    fn write_image(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir_path.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    async fn upload_file(&self, path: &Path) -> iris::UploadResponse {
        self.upload
            .execute(UploadRequest {
                image_path: path.to_path_buf(),
                file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
                file_size: std::fs::metadata(path).unwrap().len(),
                width: 64,
                height: 64,
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_upload_stores_all_artifacts() {
    let h = harness();
    let path = h.write_image("dog.png", b"dog pixels");

    let response = h.upload_file(&path).await;

    assert!(!response.already_present);
    assert_eq!(response.category.as_str(), "animals");
    assert_eq!(response.descriptions.len(), 4);
    let verdict = response.classification.unwrap();
    assert_eq!(verdict.category.as_str(), "animals");
    // First upload: no labeled neighbors yet, so only the direct method ran
    assert_eq!(verdict.methods_agree, None);

    let stats = GetStats::new(h.store.clone()).execute();
    assert_eq!(stats.database.image_vectors, 1);
    assert_eq!(stats.database.text_vectors, 4);
    assert_eq!(stats.database.total_vectors, 5);
    for ty in DescriptionType::ALL {
        assert_eq!(stats.database.type_counts[ty.as_str()], 1);
    }
}

#[tokio::test]
async fn test_reupload_of_identical_bytes_is_idempotent() {
    let h = harness();
    let path = h.write_image("dog.png", b"dog pixels");

    let first = h.upload_file(&path).await;
    // Same bytes under a different name still fingerprint identically
    let copy = h.write_image("dog-copy.png", b"dog pixels");
    let second = h.upload_file(&copy).await;

    assert!(second.already_present);
    assert_eq!(second.image_id, first.image_id);
    // The stored record's category comes back even though nothing was
    // re-classified
    assert_eq!(second.category, first.category);
    assert_eq!(second.category.as_str(), "animals");
    assert_eq!(second.descriptions.len(), 4);
    assert_eq!(h.store.image_count(), 1);
}

#[tokio::test]
async fn test_text_search_finds_matching_subject() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;
    h.upload_file(&h.write_image("city.png", b"skyline pixels")).await;

    let response = h.engine.search_by_text("a dog", Some(5)).await.unwrap();

    let top = &response.results[0];
    assert_eq!(top.category.as_str(), "animals");
    assert!((top.similarity - 1.0).abs() < 1e-5);
    assert!((top.similarity_percentage - 100.0).abs() < 1e-5);
    assert!(top.description.as_ref().unwrap().contains("dog"));

    // The skyline image sits on an orthogonal axis
    let bottom = response
        .results
        .iter()
        .find(|hit| hit.category.as_str() == "architecture")
        .unwrap();
    assert!(bottom.similarity.abs() < 1e-5);
    assert_eq!(bottom.similarity_percentage, 0.0);
}

#[tokio::test]
async fn test_phrase_unique_to_one_description_angle_still_matches() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;

    // "tripod" only appears in the technical description
    let response = h.engine.search_by_text("tripod", Some(5)).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let top = &response.results[0];
    assert!((top.similarity - 1.0).abs() < 1e-5);
    assert_eq!(top.description_type, Some(DescriptionType::Technical));
    assert!(top.description.as_ref().unwrap().contains("tripod"));
}

#[tokio::test]
async fn test_image_search_matches_visual_vector() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;
    h.upload_file(&h.write_image("city.png", b"skyline pixels")).await;

    let query = h.write_image("skyline-query.png", b"another skyline");
    let response = h.engine.search_by_image(&query, Some(1)).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let top = &response.results[0];
    assert_eq!(top.category.as_str(), "architecture");
    // Image hits are enriched with the stored basic description
    assert_eq!(top.description_type, Some(DescriptionType::Basic));
}

#[tokio::test]
async fn test_hybrid_search_fuses_both_branches() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;
    h.upload_file(&h.write_image("city.png", b"skyline pixels")).await;

    let query_image = h.write_image("dog-query.png", b"query dog");
    let response = h
        .engine
        .hybrid_search(Some("a dog"), Some(&query_image), Some(5))
        .await
        .unwrap();

    let top = &response.results[0];
    assert_eq!(top.category.as_str(), "animals");
    // Perfect match on both branches: 0.7 * 1.0 + 0.3 * 1.0
    assert!((top.similarity - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_hybrid_search_is_deterministic() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;
    h.upload_file(&h.write_image("city.png", b"skyline pixels")).await;

    let query_image = h.write_image("dog-query.png", b"query dog");
    let first = h
        .engine
        .hybrid_search(Some("a dog"), Some(&query_image), Some(5))
        .await
        .unwrap();
    let second = h
        .engine
        .hybrid_search(Some("a dog"), Some(&query_image), Some(5))
        .await
        .unwrap();

    let ids = |r: &iris::SearchResponse| -> Vec<String> {
        r.results
            .iter()
            .map(|hit| hit.image_id.as_str().to_string())
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_query_against_empty_store_returns_no_hits() {
    let h = harness();
    let response = h.engine.search_by_text("anything", Some(5)).await.unwrap();
    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let h = harness();
    assert!(matches!(
        h.engine.search_by_text("", Some(5)).await,
        Err(QueryError::InvalidQuery(_))
    ));
    assert!(matches!(
        h.engine.hybrid_search(None, None, Some(5)).await,
        Err(QueryError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_clear_resets_engine_state() {
    let h = harness();
    h.upload_file(&h.write_image("dog.png", b"dog pixels")).await;

    let after = ClearStore::new(h.store.clone()).execute();
    assert_eq!(after.database.total_vectors, 0);

    let response = h.engine.search_by_text("a dog", Some(5)).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_health_reports_healthy_providers() {
    let h = harness();
    let check = CheckHealth::new(
        Arc::new(KeywordEmbedder),
        Arc::new(SubjectVision),
        h.store.clone(),
    );
    let health = check.execute().await;
    assert_eq!(
        serde_json::to_value(&health.state).unwrap(),
        serde_json::json!("healthy")
    );
}
