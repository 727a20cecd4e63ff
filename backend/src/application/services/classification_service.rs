/// Zero-shot classification with two-method consensus.
///
/// Every image is judged by two independent strategies: the vision-language
/// model picks a category from the fixed taxonomy directly, and a k-NN vote
/// over already-labeled image vectors picks the majority category of the
/// nearest neighbors. The consensus policy reconciles the two into a single
/// verdict, falling back to "uncertain" when they disagree and neither is
/// convincing.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::providers::{ProviderError, VisionModel};
use crate::application::services::retry::call_with_retry;
use crate::config::{ClassifierConfig, GenerationConfig};
use crate::domain::base::DomainError;
use crate::domain::value_objects::{Category, EmbeddingVector};
use crate::infrastructure::store::DualVectorStore;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("External service failed: {0}")]
    ExternalService(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] DomainError),
}

/// Which strategy produced (or dominated) a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Direct,
    Embedding,
}

/// One strategy's independent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodClassification {
    pub method: ClassificationMethod,
    pub category: Category,
    pub confidence: f32,
}

/// The reconciled verdict persisted alongside the image record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub category: Category,
    pub confidence: f32,
    pub primary_method: ClassificationMethod,
    /// None when only the direct method ran (cold start)
    pub methods_agree: Option<bool>,
    pub direct: MethodClassification,
    pub embedding: Option<MethodClassification>,
}

/// Two-method zero-shot classifier
pub struct ZeroShotClassifier<V> {
    vision: Arc<V>,
    store: Arc<DualVectorStore>,
    config: ClassifierConfig,
    retry: GenerationConfig,
}

impl<V: VisionModel> ZeroShotClassifier<V> {
    pub fn new(
        vision: Arc<V>,
        store: Arc<DualVectorStore>,
        config: ClassifierConfig,
        retry: GenerationConfig,
    ) -> Self {
        ZeroShotClassifier {
            vision,
            store,
            config,
            retry,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.config.categories
    }

    /// Classify one image given its already-generated multimodal vector.
    ///
    /// Nothing is persisted here; the caller decides whether the verdict is
    /// written (upload) or discarded (classify-only).
    pub async fn classify(
        &self,
        image_path: &Path,
        image_vector: &EmbeddingVector,
    ) -> Result<ClassificationVerdict, ClassificationError> {
        let direct_result = call_with_retry("classify", &self.retry, || {
            self.vision.classify(image_path, &self.config.categories)
        })
        .await?;
        let direct = MethodClassification {
            method: ClassificationMethod::Direct,
            category: direct_result.category,
            confidence: direct_result.confidence,
        };

        let embedding = self.classify_by_embedding(image_vector)?;
        let verdict = self.reconcile(direct, embedding);

        info!(
            category = %verdict.category,
            confidence = verdict.confidence,
            primary = ?verdict.primary_method,
            agree = ?verdict.methods_agree,
            "Classification verdict"
        );
        Ok(verdict)
    }

    /// k-NN vote over labeled image vectors. Skipped (None) while the store
    /// holds fewer labeled images than the neighbor count.
    fn classify_by_embedding(
        &self,
        image_vector: &EmbeddingVector,
    ) -> Result<Option<MethodClassification>, ClassificationError> {
        let labeled = self.store.image_count();
        if labeled < self.config.neighbor_count {
            debug!(
                labeled,
                needed = self.config.neighbor_count,
                "Cold start: skipping embedding-based classification"
            );
            return Ok(None);
        }

        let neighbors = self
            .store
            .search_images(image_vector, self.config.neighbor_count)?;
        if neighbors.is_empty() {
            return Ok(None);
        }

        // Count votes in rank order so ties resolve to the category whose
        // first voter ranked highest.
        let mut vote_order: Vec<Category> = Vec::new();
        let mut votes: HashMap<Category, Vec<f32>> = HashMap::new();
        for neighbor in &neighbors {
            let category = neighbor.record.category.clone();
            if !votes.contains_key(&category) {
                vote_order.push(category.clone());
            }
            votes
                .entry(category)
                .or_default()
                .push(neighbor.similarity.clamp(0.0, 1.0));
        }

        let mut winner: Option<(&Category, &Vec<f32>)> = None;
        for category in &vote_order {
            let sims = &votes[category];
            match winner {
                Some((_, best)) if sims.len() <= best.len() => {}
                _ => winner = Some((category, sims)),
            }
        }

        let (category, sims) = match winner {
            Some(pair) => pair,
            None => return Ok(None),
        };
        let mean_similarity = sims.iter().sum::<f32>() / sims.len() as f32;
        let agreement = sims.len() as f32 / neighbors.len() as f32;

        Ok(Some(MethodClassification {
            method: ClassificationMethod::Embedding,
            category: category.clone(),
            confidence: mean_similarity * agreement,
        }))
    }

    /// The consensus policy:
    /// - primary is direct when its confidence clears T1, otherwise the more
    ///   confident method
    /// - disagreement with both confidences under T2 yields "uncertain"
    fn reconcile(
        &self,
        direct: MethodClassification,
        embedding: Option<MethodClassification>,
    ) -> ClassificationVerdict {
        let embedding = match embedding {
            Some(embedding) => embedding,
            None => {
                return ClassificationVerdict {
                    category: direct.category.clone(),
                    confidence: direct.confidence,
                    primary_method: ClassificationMethod::Direct,
                    methods_agree: None,
                    direct,
                    embedding: None,
                };
            }
        };

        let methods_agree = direct.category == embedding.category;
        let primary = if direct.confidence >= self.config.primary_threshold
            || direct.confidence >= embedding.confidence
        {
            &direct
        } else {
            &embedding
        };

        let both_weak = direct.confidence < self.config.uncertain_threshold
            && embedding.confidence < self.config.uncertain_threshold;
        let category = if !methods_agree && both_weak {
            Category::uncertain()
        } else {
            primary.category.clone()
        };

        ClassificationVerdict {
            category,
            confidence: primary.confidence,
            primary_method: primary.method,
            methods_agree: Some(methods_agree),
            direct,
            embedding: Some(embedding),
        }
    }
}
