/// Persistence infrastructure
mod schema;
mod snapshot;

pub use schema::initialize_database;
pub use snapshot::SnapshotRepository;
