pub mod admin;
pub mod search;
pub mod upload;

pub use admin::{
    ClassificationStats, ComponentHealth, DatabaseStats, HealthResponse, ServiceState,
    StatsResponse,
};
pub use search::{RankedHit, SearchMode, SearchResponse};
pub use upload::{StoredDescription, UploadRequest, UploadResponse};
