/// Image ingestion: generate, classify, store — all or nothing.
///
/// The store insert is a single atomic operation, so a failure anywhere in
/// the pipeline leaves no partial image or orphaned descriptions behind.
/// Re-uploading identical bytes is detected by content fingerprint and
/// answered from the existing records without calling the providers again
/// for storage.
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::application::dto::{StoredDescription, UploadRequest, UploadResponse};
use crate::application::providers::{EmbeddingProvider, VisionModel};
use crate::application::services::{
    ClassificationError, GenerationError, HybridEmbeddingGenerator, ZeroShotClassifier,
};
use crate::domain::base::DomainError;
use crate::domain::entities::{ImageRecord, TextRecord};
use crate::domain::value_objects::DescriptionId;
use crate::infrastructure::store::DualVectorStore;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Store rejected upload: {0}")]
    Store(#[from] DomainError),
}

pub struct UploadImage<E, V> {
    generator: Arc<HybridEmbeddingGenerator<E, V>>,
    classifier: Arc<ZeroShotClassifier<V>>,
    store: Arc<DualVectorStore>,
}

impl<E: EmbeddingProvider, V: VisionModel> UploadImage<E, V> {
    pub fn new(
        generator: Arc<HybridEmbeddingGenerator<E, V>>,
        classifier: Arc<ZeroShotClassifier<V>>,
        store: Arc<DualVectorStore>,
    ) -> Self {
        UploadImage {
            generator,
            classifier,
            store,
        }
    }

    pub async fn execute(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        if request.file_name.trim().is_empty() {
            return Err(UploadError::Validation("file name is empty".into()));
        }

        let bundle = self.generator.generate(&request.image_path).await?;
        let image_id = bundle.fingerprint.to_image_id();

        // Identical bytes already ingested: answer from the store
        if let Some(existing) = self.store.image_by_id(&image_id) {
            info!(%image_id, "Duplicate upload, returning existing records");
            let ids: HashSet<_> = [image_id.clone()].into();
            let descriptions = self
                .store
                .texts_by_image_ids(&ids)
                .into_iter()
                .map(|text| StoredDescription {
                    description_type: text.description_type,
                    text: text.description_text,
                    confidence: text.confidence,
                })
                .collect();
            return Ok(UploadResponse {
                image_id,
                category: existing.category,
                already_present: true,
                classification: None,
                descriptions,
            });
        }

        let verdict = self
            .classifier
            .classify(&request.image_path, &bundle.image_vector)
            .await?;

        let image_record = ImageRecord {
            image_id: image_id.clone(),
            vector: bundle.image_vector.clone(),
            image_path: request.image_path.display().to_string(),
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            width: request.width,
            height: request.height,
            upload_time: chrono::Utc::now(),
            category: verdict.category.clone(),
        };

        let text_records: Vec<TextRecord> = bundle
            .descriptions
            .iter()
            .map(|d| TextRecord {
                description_id: DescriptionId::from_image(&image_id, d.description_type),
                image_id: image_id.clone(),
                vector: d.vector.clone(),
                description_text: d.text.clone(),
                description_type: d.description_type,
                text_length: d.text.len(),
                confidence: d.confidence,
                generation_time: d.generation_time,
            })
            .collect();

        let descriptions: Vec<StoredDescription> = bundle
            .descriptions
            .iter()
            .map(|d| StoredDescription {
                description_type: d.description_type,
                text: d.text.clone(),
                confidence: d.confidence,
            })
            .collect();

        self.store.insert_upload(image_record, text_records)?;

        info!(
            %image_id,
            file_name = %request.file_name,
            category = %verdict.category,
            "Image ingested"
        );

        Ok(UploadResponse {
            image_id,
            category: verdict.category.clone(),
            already_present: false,
            classification: Some(verdict),
            descriptions,
        })
    }
}
