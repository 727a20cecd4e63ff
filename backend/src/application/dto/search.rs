/// Search response shapes returned to API consumers.
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Category, DescriptionType, ImageId};

/// Which query mode produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Text,
    Image,
    Hybrid,
}

/// One ranked result in a search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    pub image_id: ImageId,
    pub image_path: String,
    pub file_name: String,
    /// Raw cosine similarity (or fused score), in [-1, 1]
    pub similarity: f32,
    /// Display form: negative similarity floors at 0.0%
    pub similarity_percentage: f32,
    pub category: Category,
    /// Best-matching description text, when one contributed to the score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_type: Option<DescriptionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub mode: SearchMode,
    pub total: usize,
    pub results: Vec<RankedHit>,
}
