/// Query-side retrieval: text, image, and hybrid search.
///
/// Every query runs under one overall deadline and never retries provider
/// calls; a slow embedding service turns into a timeout error rather than
/// compounding latency. Text queries match against the description
/// collection and de-duplicate per image, image queries match the image
/// collection directly, and hybrid queries fuse both branches with fixed
/// weights.
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::application::dto::{RankedHit, SearchMode, SearchResponse};
use crate::application::providers::{EmbeddingProvider, ProviderError};
use crate::config::RetrievalConfig;
use crate::domain::base::DomainError;
use crate::domain::value_objects::{
    similarity_percentage, DescriptionType, EmbeddingVector, ImageId,
};
use crate::infrastructure::store::DualVectorStore;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query exceeded the {0:?} deadline")]
    Timeout(Duration),

    #[error("External service failed: {0}")]
    ExternalService(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] DomainError),
}

/// Per-image best evidence from one search branch
struct BranchHit {
    similarity: f32,
    description: Option<(String, DescriptionType)>,
}

pub struct RetrievalEngine<E> {
    embeddings: Arc<E>,
    store: Arc<DualVectorStore>,
    config: RetrievalConfig,
}

impl<E: EmbeddingProvider> RetrievalEngine<E> {
    pub fn new(embeddings: Arc<E>, store: Arc<DualVectorStore>, config: RetrievalConfig) -> Self {
        RetrievalEngine {
            embeddings,
            store,
            config,
        }
    }

    /// Natural-language query against the description collection.
    pub async fn search_by_text(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<SearchResponse, QueryError> {
        self.with_deadline(async {
            let top_k = self.resolve_top_k(top_k)?;
            let query = query.trim();
            if query.is_empty() {
                return Err(QueryError::InvalidQuery("query text is empty".into()));
            }

            let vector = self.embeddings.embed_text(query).await?;
            let branch = self.text_branch(&vector, top_k)?;
            debug!(query, matched_images = branch.len(), "Text search");
            Ok(self.respond(SearchMode::Text, branch, top_k))
        })
        .await
    }

    /// Query-by-example against the image collection. Results are enriched
    /// with each image's stored basic description.
    pub async fn search_by_image(
        &self,
        image_path: &Path,
        top_k: Option<usize>,
    ) -> Result<SearchResponse, QueryError> {
        self.with_deadline(async {
            let top_k = self.resolve_top_k(top_k)?;
            let vector = self.embeddings.embed_image(image_path).await?;
            let branch = self.image_branch(&vector, top_k)?;
            debug!(matched_images = branch.len(), "Image search");
            Ok(self.respond(SearchMode::Image, branch, top_k))
        })
        .await
    }

    /// Weighted fusion of the text and image branches. Either input may be
    /// absent; an image found by only one branch scores zero on the other.
    pub async fn hybrid_search(
        &self,
        query: Option<&str>,
        image_path: Option<&Path>,
        top_k: Option<usize>,
    ) -> Result<SearchResponse, QueryError> {
        self.with_deadline(async {
            let top_k = self.resolve_top_k(top_k)?;
            let query = query.map(str::trim).filter(|q| !q.is_empty());
            if query.is_none() && image_path.is_none() {
                return Err(QueryError::InvalidQuery(
                    "hybrid search needs query text, an image, or both".into(),
                ));
            }

            let (text_branch, image_branch) = tokio::try_join!(
                self.optional_text_branch(query, top_k),
                self.optional_image_branch(image_path, top_k),
            )?;

            let weights = self.config.fusion;
            let mut fused: HashMap<ImageId, BranchHit> = HashMap::new();
            if let Some(branch) = text_branch {
                for (image_id, hit) in branch {
                    fused.insert(
                        image_id,
                        BranchHit {
                            similarity: weights.text * hit.similarity,
                            description: hit.description,
                        },
                    );
                }
            }
            if let Some(branch) = image_branch {
                for (image_id, hit) in branch {
                    let weighted = weights.image * hit.similarity;
                    fused
                        .entry(image_id)
                        .and_modify(|existing| existing.similarity += weighted)
                        .or_insert(BranchHit {
                            similarity: weighted,
                            description: hit.description,
                        });
                }
            }

            debug!(matched_images = fused.len(), "Hybrid search");
            Ok(self.respond(SearchMode::Hybrid, fused, top_k))
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        work: impl Future<Output = Result<T, QueryError>>,
    ) -> Result<T, QueryError> {
        match tokio::time::timeout(self.config.query_deadline, work).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.config.query_deadline)),
        }
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize, QueryError> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 {
            return Err(QueryError::InvalidQuery(
                "result count must be positive".into(),
            ));
        }
        Ok(top_k)
    }

    /// Search the description collection, then keep the single best-scoring
    /// description per image. Over-fetches so de-duplication does not starve
    /// the final page.
    fn text_branch(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> Result<HashMap<ImageId, BranchHit>, QueryError> {
        let fetch = self.config.overfetch.max(top_k);
        let hits = self.store.search_texts(vector, fetch)?;

        let mut best: HashMap<ImageId, BranchHit> = HashMap::new();
        // Hits arrive ranked, so the first hit per image is its best
        for hit in hits {
            best.entry(hit.record.image_id.clone())
                .or_insert(BranchHit {
                    similarity: hit.similarity,
                    description: Some((
                        hit.record.description_text,
                        hit.record.description_type,
                    )),
                });
        }
        Ok(best)
    }

    fn image_branch(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> Result<HashMap<ImageId, BranchHit>, QueryError> {
        let hits = self.store.search_images(vector, top_k)?;

        let ids: HashSet<ImageId> = hits.iter().map(|h| h.record.image_id.clone()).collect();
        let mut basics: HashMap<ImageId, (String, DescriptionType)> = HashMap::new();
        for text in self.store.texts_by_image_ids(&ids) {
            if text.description_type == DescriptionType::Basic {
                basics.insert(
                    text.image_id.clone(),
                    (text.description_text, text.description_type),
                );
            }
        }

        Ok(hits
            .into_iter()
            .map(|hit| {
                let description = basics.remove(&hit.record.image_id);
                (
                    hit.record.image_id,
                    BranchHit {
                        similarity: hit.similarity,
                        description,
                    },
                )
            })
            .collect())
    }

    async fn optional_text_branch(
        &self,
        query: Option<&str>,
        top_k: usize,
    ) -> Result<Option<HashMap<ImageId, BranchHit>>, QueryError> {
        match query {
            Some(query) => {
                let vector = self.embeddings.embed_text(query).await?;
                Ok(Some(self.text_branch(&vector, top_k)?))
            }
            None => Ok(None),
        }
    }

    /// Fusion headroom: fetch more than the final page so an image scoring
    /// well on the other branch is not dropped before the merge.
    async fn optional_image_branch(
        &self,
        image_path: Option<&Path>,
        top_k: usize,
    ) -> Result<Option<HashMap<ImageId, BranchHit>>, QueryError> {
        match image_path {
            Some(path) => {
                let vector = self.embeddings.embed_image(path).await?;
                let fetch = self.config.overfetch.max(top_k);
                Ok(Some(self.image_branch(&vector, fetch)?))
            }
            None => Ok(None),
        }
    }

    /// Join branch evidence with image records, rank deterministically, and
    /// truncate to the requested page.
    fn respond(
        &self,
        mode: SearchMode,
        branch: HashMap<ImageId, BranchHit>,
        top_k: usize,
    ) -> SearchResponse {
        let ids: HashSet<ImageId> = branch.keys().cloned().collect();
        let mut hits: Vec<(u64, RankedHit)> = Vec::with_capacity(branch.len());

        for (order, record) in self.store.images_by_ids(&ids) {
            let evidence = match branch.get(&record.image_id) {
                Some(evidence) => evidence,
                None => continue,
            };
            let (description, description_type) = match &evidence.description {
                Some((text, ty)) => (Some(text.clone()), Some(*ty)),
                None => (None, None),
            };
            hits.push((
                order,
                RankedHit {
                    image_id: record.image_id,
                    image_path: record.image_path,
                    file_name: record.file_name,
                    similarity: evidence.similarity,
                    similarity_percentage: similarity_percentage(evidence.similarity),
                    category: record.category,
                    description,
                    description_type,
                },
            ));
        }

        hits.sort_by(|(order_a, a), (order_b, b)| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(order_a.cmp(order_b))
        });
        hits.truncate(top_k);

        let results: Vec<RankedHit> = hits.into_iter().map(|(_, hit)| hit).collect();
        SearchResponse {
            mode,
            total: results.len(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::providers::ProviderResult;
    use crate::domain::entities::{ImageRecord, TextRecord};
    use crate::domain::value_objects::{Category, DescriptionId, EmbeddingVector};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Embedder mapping known inputs to fixed two-dimensional vectors
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn text_dimension(&self) -> usize {
            2
        }

        fn image_dimension(&self) -> usize {
            2
        }

        async fn embed_text(&self, text: &str) -> ProviderResult<EmbeddingVector> {
            let values = match text {
                "sunset" => vec![1.0, 0.0],
                "machinery" => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            };
            Ok(EmbeddingVector::new(values).unwrap())
        }

        async fn embed_image(&self, _image_path: &Path) -> ProviderResult<EmbeddingVector> {
            Ok(EmbeddingVector::new(vec![1.0, 0.0]).unwrap())
        }

        async fn health(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn image(id: &str, vector: Vec<f32>) -> ImageRecord {
        ImageRecord {
            image_id: ImageId::new(id).unwrap(),
            vector: EmbeddingVector::new(vector).unwrap(),
            image_path: format!("/uploads/{}.png", id),
            file_name: format!("{}.png", id),
            file_size: 2048,
            width: 128,
            height: 128,
            upload_time: Utc::now(),
            category: Category::new("landscapes").unwrap(),
        }
    }

    fn text(image_id: &str, ty: DescriptionType, body: &str, vector: Vec<f32>) -> TextRecord {
        let image_id = ImageId::new(image_id).unwrap();
        TextRecord {
            description_id: DescriptionId::from_image(&image_id, ty),
            image_id,
            vector: EmbeddingVector::new(vector).unwrap(),
            description_text: body.into(),
            description_type: ty,
            text_length: body.len(),
            confidence: 0.9,
            generation_time: Utc::now(),
        }
    }

    fn engine(store: Arc<DualVectorStore>) -> RetrievalEngine<StubEmbedder> {
        RetrievalEngine::new(Arc::new(StubEmbedder), store, RetrievalConfig::default())
    }

    fn seeded_store() -> Arc<DualVectorStore> {
        let store = Arc::new(DualVectorStore::new(2, 2));
        store
            .insert_upload(
                image("beach", vec![1.0, 0.0]),
                vec![
                    text(
                        "beach",
                        DescriptionType::Basic,
                        "a beach at sunset",
                        vec![0.9, 0.1],
                    ),
                    text(
                        "beach",
                        DescriptionType::Detailed,
                        "golden light over calm waves",
                        vec![1.0, 0.0],
                    ),
                ],
            )
            .unwrap();
        store
            .insert_upload(
                image("factory", vec![0.0, 1.0]),
                vec![text(
                    "factory",
                    DescriptionType::Basic,
                    "industrial machinery hall",
                    vec![0.0, 1.0],
                )],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_text_search_deduplicates_by_image() {
        let engine = engine(seeded_store());
        let response = engine.search_by_text("sunset", Some(5)).await.unwrap();

        assert_eq!(response.mode, SearchMode::Text);
        // Both of beach's descriptions match, but the image appears once
        let beach_hits = response
            .results
            .iter()
            .filter(|hit| hit.image_id.as_str() == "beach")
            .count();
        assert_eq!(beach_hits, 1);

        // The best-scoring description is the one surfaced
        let top = &response.results[0];
        assert_eq!(top.image_id.as_str(), "beach");
        assert_eq!(top.description.as_deref(), Some("golden light over calm waves"));
        assert_eq!(top.description_type, Some(DescriptionType::Detailed));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = engine(seeded_store());
        let result = engine.search_by_text("   ", Some(5)).await;
        assert!(matches!(result, Err(QueryError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let engine = engine(seeded_store());
        let result = engine.search_by_text("sunset", Some(0)).await;
        assert!(matches!(result, Err(QueryError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_image_search_enriches_with_basic_description() {
        let engine = engine(seeded_store());
        let response = engine
            .search_by_image(Path::new("/tmp/query.png"), Some(5))
            .await
            .unwrap();

        assert_eq!(response.mode, SearchMode::Image);
        let top = &response.results[0];
        assert_eq!(top.image_id.as_str(), "beach");
        assert_eq!(top.description.as_deref(), Some("a beach at sunset"));
        assert_eq!(top.description_type, Some(DescriptionType::Basic));
    }

    #[tokio::test]
    async fn test_hybrid_requires_at_least_one_input() {
        let engine = engine(seeded_store());
        let result = engine.hybrid_search(None, None, Some(5)).await;
        assert!(matches!(result, Err(QueryError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_hybrid_fuses_with_fixed_weights() {
        let engine = engine(seeded_store());
        let response = engine
            .hybrid_search(Some("sunset"), Some(Path::new("/tmp/query.png")), Some(5))
            .await
            .unwrap();

        assert_eq!(response.mode, SearchMode::Hybrid);
        let top = &response.results[0];
        assert_eq!(top.image_id.as_str(), "beach");
        // Text branch matches beach's detailed description at similarity 1.0
        // and the image branch matches its vector at 1.0
        assert!((top.similarity - 1.0).abs() < 1e-5);
        assert!((top.similarity_percentage - 100.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hybrid_single_branch_scores_are_weighted() {
        let engine = engine(seeded_store());
        let response = engine
            .hybrid_search(Some("machinery"), None, Some(5))
            .await
            .unwrap();

        // Only the text branch ran; factory's perfect match scores 0.7
        let top = &response.results[0];
        assert_eq!(top.image_id.as_str(), "factory");
        assert!((top.similarity - 0.7).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let engine = engine(seeded_store());
        let response = engine.search_by_text("anything", Some(1)).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.total, 1);
    }

    /// Embedder that never answers within a short deadline
    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        fn text_dimension(&self) -> usize {
            2
        }

        fn image_dimension(&self) -> usize {
            2
        }

        async fn embed_text(&self, _text: &str) -> ProviderResult<EmbeddingVector> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(EmbeddingVector::new(vec![1.0, 0.0]).unwrap())
        }

        async fn embed_image(&self, _image_path: &Path) -> ProviderResult<EmbeddingVector> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(EmbeddingVector::new(vec![1.0, 0.0]).unwrap())
        }

        async fn health(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deadline_expires_into_timeout_error() {
        let config = RetrievalConfig {
            query_deadline: Duration::from_millis(20),
            ..RetrievalConfig::default()
        };
        let engine = RetrievalEngine::new(Arc::new(StalledEmbedder), seeded_store(), config);

        let text = engine.search_by_text("sunset", Some(5)).await;
        assert!(matches!(text, Err(QueryError::Timeout(_))));

        let image = engine.search_by_image(Path::new("/tmp/q.png"), Some(5)).await;
        assert!(matches!(image, Err(QueryError::Timeout(_))));

        let hybrid = engine.hybrid_search(Some("sunset"), None, Some(5)).await;
        assert!(matches!(hybrid, Err(QueryError::Timeout(_))));
    }
}
