/// Upload request/response shapes.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::services::ClassificationVerdict;
use crate::domain::value_objects::{Category, DescriptionType, ImageId};

/// One image handed to the ingestion pipeline
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
}

/// Summary of one stored description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDescription {
    pub description_type: DescriptionType,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub image_id: ImageId,
    /// The category on the stored record, whether assigned by this call or
    /// by the original upload of the same bytes
    pub category: Category,
    /// True when the fingerprint matched an existing record and nothing new
    /// was stored
    pub already_present: bool,
    /// The full consensus verdict; absent on duplicate uploads, which are
    /// answered from the store without re-classifying
    pub classification: Option<ClassificationVerdict>,
    pub descriptions: Vec<StoredDescription>,
}
