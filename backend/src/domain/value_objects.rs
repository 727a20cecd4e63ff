/// Value objects for the domain layer
use super::base::{DomainError, DomainResult, ValueObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a stored image.
///
/// Derived from the image's content fingerprint, so identical bytes always
/// map to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue("ImageId cannot be empty".to_string()));
        }
        Ok(ImageId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for ImageId {}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stored text description vector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptionId(String);

impl DescriptionId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue(
                "DescriptionId cannot be empty".to_string(),
            ));
        }
        Ok(DescriptionId(id))
    }

    /// Conventional id for one description angle of an image:
    /// `<image_id>_<type>`
    pub fn from_image(image_id: &ImageId, description_type: DescriptionType) -> Self {
        DescriptionId(format!("{}_{}", image_id.as_str(), description_type.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for DescriptionId {}

impl fmt::Display for DescriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A classification category from the zero-shot taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "Category cannot be empty".to_string(),
            ));
        }
        Ok(Category(name))
    }

    /// Sentinel verdict used when the two classification methods disagree
    /// and neither is confident enough to trust on its own.
    pub fn uncertain() -> Self {
        Category("uncertain".to_string())
    }

    pub fn is_uncertain(&self) -> bool {
        self.0 == "uncertain"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Category {}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four description angles generated for every uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionType {
    /// Plain visual inventory: objects, colors, composition
    Basic,
    /// Deeper recognition: scene, activity, relationships
    Detailed,
    /// Mood, atmosphere, emotional reading
    Emotional,
    /// Photographic/technical characteristics
    Technical,
}

impl DescriptionType {
    pub const ALL: [DescriptionType; 4] = [
        DescriptionType::Basic,
        DescriptionType::Detailed,
        DescriptionType::Emotional,
        DescriptionType::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionType::Basic => "basic",
            DescriptionType::Detailed => "detailed",
            DescriptionType::Emotional => "emotional",
            DescriptionType::Technical => "technical",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "basic" => Ok(DescriptionType::Basic),
            "detailed" => Ok(DescriptionType::Detailed),
            "emotional" => Ok(DescriptionType::Emotional),
            "technical" => Ok(DescriptionType::Technical),
            other => Err(DomainError::InvalidValue(format!(
                "Unknown description type: {}",
                other
            ))),
        }
    }
}

impl ValueObject for DescriptionType {}

impl fmt::Display for DescriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fixed-dimension embedding vector.
///
/// Similarity is computed on the raw values; no normalization is assumed to
/// have happened at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> DomainResult<Self> {
        if values.is_empty() {
            return Err(DomainError::InvalidValue(
                "Embedding vector cannot be empty".to_string(),
            ));
        }
        Ok(EmbeddingVector { values })
    }

    pub fn dimension_count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Cosine similarity against another vector, clamped to [-1, 1].
    ///
    /// A zero-norm operand yields 0.0 rather than NaN.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> DomainResult<f32> {
        if self.values.len() != other.values.len() {
            return Err(DomainError::DimensionMismatch {
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
    }
}

impl ValueObject for EmbeddingVector {}

/// Map a cosine similarity to the user-facing percentage: negative
/// similarities floor at 0, rounded to one decimal place.
pub fn similarity_percentage(similarity: f32) -> f32 {
    (similarity.max(0.0) * 1000.0).round() / 10.0
}

/// Content-addressed fingerprint of an image's raw bytes (blake3, hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        ContentFingerprint(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fingerprint doubles as the stable image id for the store.
    pub fn to_image_id(&self) -> ImageId {
        ImageId(self.0.clone())
    }
}

impl ValueObject for ContentFingerprint {}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
