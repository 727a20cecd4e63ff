pub mod admin;
pub mod classify;
pub mod search;
pub mod upload;

pub use admin::{CheckHealth, ClearStore, GetStats};
pub use classify::{ClassifyError, ClassifyImage};
pub use search::{QueryError, RetrievalEngine};
pub use upload::{UploadError, UploadImage};
