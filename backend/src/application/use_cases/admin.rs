/// Administrative operations: statistics, health probing, store reset.
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::dto::{
    ClassificationStats, ComponentHealth, DatabaseStats, HealthResponse, ServiceState,
    StatsResponse,
};
use crate::application::providers::{EmbeddingProvider, ProviderResult, VisionModel};
use crate::domain::value_objects::Category;
use crate::infrastructure::store::DualVectorStore;

/// Derives all statistics from the live store; nothing is counted
/// separately, so the numbers cannot drift from the stored records.
pub struct GetStats {
    store: Arc<DualVectorStore>,
}

impl GetStats {
    pub fn new(store: Arc<DualVectorStore>) -> Self {
        GetStats { store }
    }

    pub fn execute(&self) -> StatsResponse {
        let stats = self.store.stats();
        let uncertain_count = stats
            .category_counts
            .get(Category::uncertain().as_str())
            .copied()
            .unwrap_or(0);

        let category_percentages = stats
            .category_counts
            .iter()
            .map(|(category, count)| {
                let share = *count as f32 / stats.image_vectors as f32;
                (category.clone(), (share * 1000.0).round() / 10.0)
            })
            .collect();

        StatsResponse {
            database: DatabaseStats {
                total_vectors: stats.total_vectors,
                image_vectors: stats.image_vectors,
                text_vectors: stats.text_vectors,
                type_counts: stats.type_counts,
            },
            classification: ClassificationStats {
                classified_images: stats.image_vectors,
                category_counts: stats.category_counts,
                category_percentages,
                uncertain_count,
            },
        }
    }
}

/// Drops every stored vector from both collections in one step.
pub struct ClearStore {
    store: Arc<DualVectorStore>,
}

impl ClearStore {
    pub fn new(store: Arc<DualVectorStore>) -> Self {
        ClearStore { store }
    }

    pub fn execute(&self) -> StatsResponse {
        let before = self.store.stats();
        self.store.clear();
        info!(
            removed_images = before.image_vectors,
            removed_texts = before.text_vectors,
            "Store cleared"
        );
        GetStats::new(self.store.clone()).execute()
    }
}

/// Probes both external providers; the engine is healthy only when both
/// respond.
pub struct CheckHealth<E, V> {
    embeddings: Arc<E>,
    vision: Arc<V>,
    store: Arc<DualVectorStore>,
}

impl<E: EmbeddingProvider, V: VisionModel> CheckHealth<E, V> {
    pub fn new(embeddings: Arc<E>, vision: Arc<V>, store: Arc<DualVectorStore>) -> Self {
        CheckHealth {
            embeddings,
            vision,
            store,
        }
    }

    pub async fn execute(&self) -> HealthResponse {
        let (embeddings, vision) =
            tokio::join!(self.embeddings.health(), self.vision.health());

        let embeddings = component_health("embeddings", embeddings);
        let vision = component_health("vision", vision);

        let state = if embeddings.state == ServiceState::Healthy
            && vision.state == ServiceState::Healthy
        {
            ServiceState::Healthy
        } else {
            ServiceState::Degraded
        };

        HealthResponse {
            state,
            embeddings,
            vision,
            stored_images: self.store.image_count(),
        }
    }
}

fn component_health(component: &str, result: ProviderResult<()>) -> ComponentHealth {
    match result {
        Ok(()) => ComponentHealth {
            state: ServiceState::Healthy,
            detail: None,
        },
        Err(error) => {
            warn!(component, %error, "Health probe failed");
            ComponentHealth {
                state: ServiceState::Degraded,
                detail: Some(error.to_string()),
            }
        }
    }
}
