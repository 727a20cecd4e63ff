/// Base DDD abstractions for the domain layer
use std::fmt::Debug;

/// Trait for value objects - immutable objects defined by their attributes
/// Value objects are equal if all their attributes are equal
pub trait ValueObject: Clone + PartialEq + Debug {}

/// Trait for entities - objects with identity that can change over time
/// Entities are equal if their IDs are equal, regardless of other attributes
pub trait Entity: Debug {
    type Id: ValueObject;

    fn id(&self) -> &Self::Id;
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid value provided
    InvalidValue(String),
    /// Vector length does not match the target collection's dimension
    DimensionMismatch { expected: usize, actual: usize },
    /// Entity not found
    NotFound(String),
    /// A referential integrity check failed (e.g. a text vector pointing at
    /// a missing image record)
    ConsistencyViolation(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            DomainError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::ConsistencyViolation(msg) => {
                write!(f, "Consistency violation: {}", msg)
            }
        }
    }
}

impl std::error::Error for DomainError {}
