/// Entities for the dual-collection data model
use super::base::Entity;
use super::value_objects::{
    Category, DescriptionId, DescriptionType, EmbeddingVector, ImageId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record in the image collection: the multimodal vector for an uploaded
/// image plus its file metadata and the category assigned at upload time.
///
/// The category is written exactly once; records are never partially
/// updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: ImageId,
    pub vector: EmbeddingVector,
    pub image_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub upload_time: DateTime<Utc>,
    pub category: Category,
}

impl Entity for ImageRecord {
    type Id = ImageId;

    fn id(&self) -> &Self::Id {
        &self.image_id
    }
}

/// One record in the text collection: the embedding of a single description
/// angle, keyed by its own id and carrying the owning image's id as a
/// foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub description_id: DescriptionId,
    pub image_id: ImageId,
    pub vector: EmbeddingVector,
    pub description_text: String,
    pub description_type: DescriptionType,
    pub text_length: usize,
    pub confidence: f32,
    pub generation_time: DateTime<Utc>,
}

impl Entity for TextRecord {
    type Id = DescriptionId;

    fn id(&self) -> &Self::Id {
        &self.description_id
    }
}
