/// Engine configuration.
///
/// All tunables live in one immutable structure built at startup and passed
/// by reference into the components; nothing mutates configuration at
/// runtime. The numeric defaults mirror the documented behavior of the
/// system and are deliberately not asserted anywhere as invariants.
use std::time::Duration;

use crate::domain::value_objects::Category;

/// Weights applied when fusing the text and image branches of a hybrid query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub text: f32,
    pub image: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        FusionWeights { text: 0.7, image: 0.3 }
    }
}

/// Retrieval tunables
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Result count when the caller does not specify one
    pub default_top_k: usize,
    /// Over-fetch size for the text-collection stage, giving de-duplication
    /// headroom when one image matches through several description types
    pub overfetch: usize,
    /// Overall deadline for a whole query, covering its embedding calls
    pub query_deadline: Duration,
    pub fusion: FusionWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            default_top_k: 9,
            overfetch: 20,
            query_deadline: Duration::from_secs(30),
            fusion: FusionWeights::default(),
        }
    }
}

/// Generation-path tunables (upload pipeline only; queries never retry)
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Timeout applied to each individual provider call
    pub call_timeout: Duration,
    /// Retry attempts after the first failure, transient errors only
    pub max_retries: u32,
    /// First backoff delay; doubles on every further attempt
    pub initial_backoff: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            call_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Zero-shot classifier tunables
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub categories: Vec<Category>,
    /// T1: the direct method is trusted outright at or above this confidence
    pub primary_threshold: f32,
    /// T2: when the methods disagree and both fall below this, the verdict
    /// is "uncertain"
    pub uncertain_threshold: f32,
    /// k nearest labeled neighbors consulted by the embedding strategy
    pub neighbor_count: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            categories: default_categories(),
            primary_threshold: 0.8,
            uncertain_threshold: 0.5,
            neighbor_count: 5,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub classifier: ClassifierConfig,
}

/// The default zero-shot taxonomy
pub fn default_categories() -> Vec<Category> {
    [
        "animals",
        "plants",
        "architecture",
        "vehicles",
        "food",
        "people",
        "landscapes",
        "technology",
        "artwork",
        "sports",
    ]
    .iter()
    .map(|name| Category::new(*name).expect("static category names are non-empty"))
    .collect()
}
