/// Administrative response shapes: statistics and health.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub total_vectors: usize,
    pub image_vectors: usize,
    pub text_vectors: usize,
    /// Text vectors broken down by description type
    pub type_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationStats {
    pub classified_images: usize,
    pub category_counts: HashMap<String, usize>,
    /// Share of each category among stored images, rounded to one decimal
    pub category_percentages: HashMap<String, f32>,
    pub uncertain_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub database: DatabaseStats,
    pub classification: ClassificationStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub state: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub state: ServiceState,
    pub embeddings: ComponentHealth,
    pub vision: ComponentHealth,
    pub stored_images: usize,
}
