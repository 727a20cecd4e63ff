/// In-process dual-collection vector store.
///
/// Two explicitly owned registries (image vectors, text description vectors)
/// guarded by collection-scoped read/write locks. Reads run concurrently;
/// inserts and clears take exclusive access, and an upload commits to both
/// collections under both write locks so a concurrent search never observes
/// an image vector without its text vectors or vice versa.
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::domain::base::{DomainError, DomainResult};
use crate::domain::entities::{ImageRecord, TextRecord};
use crate::domain::value_objects::{EmbeddingVector, ImageId};

/// An image hit from a similarity search or a filtered read
#[derive(Debug, Clone)]
pub struct ScoredImage {
    pub insertion_order: u64,
    pub similarity: f32,
    pub record: ImageRecord,
}

/// A text hit from a similarity search or a filtered read
#[derive(Debug, Clone)]
pub struct ScoredText {
    pub insertion_order: u64,
    pub similarity: f32,
    pub record: TextRecord,
}

/// Aggregated counts over both collections
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_vectors: usize,
    pub image_vectors: usize,
    pub text_vectors: usize,
    /// "multimodal" plus one entry per description type
    pub type_counts: HashMap<String, usize>,
    pub category_counts: HashMap<String, usize>,
}

struct Stored<R> {
    seq: u64,
    record: R,
}

struct Collection<R> {
    records: Vec<Stored<R>>,
    next_seq: u64,
}

impl<R> Collection<R> {
    fn new() -> Self {
        Collection {
            records: Vec::new(),
            next_seq: 0,
        }
    }

    fn push(&mut self, record: R) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push(Stored { seq, record });
    }

    fn clear(&mut self) {
        self.records.clear();
        self.next_seq = 0;
    }
}

/// The dual-collection vector store
pub struct DualVectorStore {
    image_dimension: usize,
    text_dimension: usize,
    images: RwLock<Collection<ImageRecord>>,
    texts: RwLock<Collection<TextRecord>>,
}

impl DualVectorStore {
    pub fn new(image_dimension: usize, text_dimension: usize) -> Self {
        info!(
            image_dimension,
            text_dimension, "Initializing dual-collection vector store"
        );
        DualVectorStore {
            image_dimension,
            text_dimension,
            images: RwLock::new(Collection::new()),
            texts: RwLock::new(Collection::new()),
        }
    }

    pub fn image_dimension(&self) -> usize {
        self.image_dimension
    }

    pub fn text_dimension(&self) -> usize {
        self.text_dimension
    }

    fn validate_upload(
        &self,
        image: &ImageRecord,
        texts: &[TextRecord],
    ) -> DomainResult<()> {
        if image.vector.dimension_count() != self.image_dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.image_dimension,
                actual: image.vector.dimension_count(),
            });
        }
        for text in texts {
            if text.vector.dimension_count() != self.text_dimension {
                return Err(DomainError::DimensionMismatch {
                    expected: self.text_dimension,
                    actual: text.vector.dimension_count(),
                });
            }
            if text.image_id != image.image_id {
                return Err(DomainError::ConsistencyViolation(format!(
                    "Text vector {} references image {} but is being committed with image {}",
                    text.description_id, text.image_id, image.image_id
                )));
            }
        }
        Ok(())
    }

    /// Commit one upload: the image vector and all of its text vectors as a
    /// single atomic unit. Nothing is written if any validation fails.
    pub fn insert_upload(
        &self,
        image: ImageRecord,
        texts: Vec<TextRecord>,
    ) -> DomainResult<()> {
        self.validate_upload(&image, &texts)?;

        // Lock order: images before texts, same as clear()
        let mut image_guard = self.images.write();
        let mut text_guard = self.texts.write();

        if image_guard
            .records
            .iter()
            .any(|s| s.record.image_id == image.image_id)
        {
            return Err(DomainError::InvalidValue(format!(
                "Image {} is already stored",
                image.image_id
            )));
        }

        debug!(
            image_id = %image.image_id,
            text_vectors = texts.len(),
            "Committing upload to both collections"
        );

        image_guard.push(image);
        for text in texts {
            text_guard.push(text);
        }
        Ok(())
    }

    /// Search the image collection by cosine similarity, descending, ties
    /// broken by ascending insertion order. An empty collection yields an
    /// empty result.
    pub fn search_images(
        &self,
        query: &EmbeddingVector,
        top_k: usize,
    ) -> DomainResult<Vec<ScoredImage>> {
        if query.dimension_count() != self.image_dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.image_dimension,
                actual: query.dimension_count(),
            });
        }

        let guard = self.images.read();
        let mut hits = Vec::with_capacity(guard.records.len());
        for stored in &guard.records {
            let similarity = query.cosine_similarity(&stored.record.vector)?;
            hits.push(ScoredImage {
                insertion_order: stored.seq,
                similarity,
                record: stored.record.clone(),
            });
        }
        drop(guard);

        rank(&mut hits, |h| (h.similarity, h.insertion_order));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Search the text collection by cosine similarity, descending, ties
    /// broken by ascending insertion order.
    pub fn search_texts(
        &self,
        query: &EmbeddingVector,
        top_k: usize,
    ) -> DomainResult<Vec<ScoredText>> {
        if query.dimension_count() != self.text_dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.text_dimension,
                actual: query.dimension_count(),
            });
        }

        let guard = self.texts.read();
        let mut hits = Vec::with_capacity(guard.records.len());
        for stored in &guard.records {
            let similarity = query.cosine_similarity(&stored.record.vector)?;
            hits.push(ScoredText {
                insertion_order: stored.seq,
                similarity,
                record: stored.record.clone(),
            });
        }
        drop(guard);

        rank(&mut hits, |h| (h.similarity, h.insertion_order));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// All image records whose id is in the given set, in insertion order
    pub fn images_by_ids(&self, ids: &HashSet<ImageId>) -> Vec<(u64, ImageRecord)> {
        let guard = self.images.read();
        guard
            .records
            .iter()
            .filter(|s| ids.contains(&s.record.image_id))
            .map(|s| (s.seq, s.record.clone()))
            .collect()
    }

    /// All text records belonging to any of the given images, in insertion
    /// order
    pub fn texts_by_image_ids(&self, ids: &HashSet<ImageId>) -> Vec<TextRecord> {
        let guard = self.texts.read();
        guard
            .records
            .iter()
            .filter(|s| ids.contains(&s.record.image_id))
            .map(|s| s.record.clone())
            .collect()
    }

    pub fn image_by_id(&self, id: &ImageId) -> Option<ImageRecord> {
        let guard = self.images.read();
        guard
            .records
            .iter()
            .find(|s| &s.record.image_id == id)
            .map(|s| s.record.clone())
    }

    pub fn contains_image(&self, id: &ImageId) -> bool {
        self.images.read().records.iter().any(|s| &s.record.image_id == id)
    }

    pub fn image_count(&self) -> usize {
        self.images.read().records.len()
    }

    /// Empty both collections as one atomic operation; no reader can observe
    /// one collection cleared and the other intact.
    pub fn clear(&self) {
        let mut image_guard = self.images.write();
        let mut text_guard = self.texts.write();
        info!(
            image_vectors = image_guard.records.len(),
            text_vectors = text_guard.records.len(),
            "Clearing both vector collections"
        );
        image_guard.clear();
        text_guard.clear();
    }

    pub fn stats(&self) -> StoreStats {
        let image_guard = self.images.read();
        let text_guard = self.texts.read();

        let mut type_counts = HashMap::new();
        if !image_guard.records.is_empty() {
            type_counts.insert("multimodal".to_string(), image_guard.records.len());
        }
        let mut category_counts = HashMap::new();
        for stored in &image_guard.records {
            *category_counts
                .entry(stored.record.category.as_str().to_string())
                .or_insert(0) += 1;
        }
        for stored in &text_guard.records {
            *type_counts
                .entry(stored.record.description_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        StoreStats {
            total_vectors: image_guard.records.len() + text_guard.records.len(),
            image_vectors: image_guard.records.len(),
            text_vectors: text_guard.records.len(),
            type_counts,
            category_counts,
        }
    }

    /// Snapshot export: image records in insertion order
    pub fn export_images(&self) -> Vec<ImageRecord> {
        self.images.read().records.iter().map(|s| s.record.clone()).collect()
    }

    /// Snapshot export: text records in insertion order
    pub fn export_texts(&self) -> Vec<TextRecord> {
        self.texts.read().records.iter().map(|s| s.record.clone()).collect()
    }

    /// Replace the store's contents with a previously exported snapshot.
    /// Records are re-validated (dimensions and text→image references) and
    /// re-sequenced in the given order.
    pub fn restore(
        &self,
        images: Vec<ImageRecord>,
        texts: Vec<TextRecord>,
    ) -> DomainResult<()> {
        let known_ids: HashSet<&ImageId> = images.iter().map(|i| &i.image_id).collect();
        for image in &images {
            if image.vector.dimension_count() != self.image_dimension {
                return Err(DomainError::DimensionMismatch {
                    expected: self.image_dimension,
                    actual: image.vector.dimension_count(),
                });
            }
        }
        for text in &texts {
            if text.vector.dimension_count() != self.text_dimension {
                return Err(DomainError::DimensionMismatch {
                    expected: self.text_dimension,
                    actual: text.vector.dimension_count(),
                });
            }
            if !known_ids.contains(&text.image_id) {
                return Err(DomainError::ConsistencyViolation(format!(
                    "Text vector {} references unknown image {}",
                    text.description_id, text.image_id
                )));
            }
        }

        let mut image_guard = self.images.write();
        let mut text_guard = self.texts.write();
        image_guard.clear();
        text_guard.clear();
        let image_count = images.len();
        let text_count = texts.len();
        for image in images {
            image_guard.push(image);
        }
        for text in texts {
            text_guard.push(text);
        }
        info!(image_count, text_count, "Restored vector store from snapshot");
        Ok(())
    }
}

/// Sort hits by similarity descending, insertion order ascending on ties.
/// Similarities are clamped upstream so a total order always exists.
fn rank<T, F>(hits: &mut [T], key: F)
where
    F: Fn(&T) -> (f32, u64),
{
    hits.sort_by(|a, b| {
        let (score_a, seq_a) = key(a);
        let (score_b, seq_b) = key(b);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(seq_a.cmp(&seq_b))
    });
}
