//! Storage error types.

use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Entity name for error messages ("user", "product", ...).
        entity: &'static str,
    },

    /// A storage-level unique constraint was violated.
    #[error("unique constraint violated: {constraint}")]
    Conflict {
        /// Name of the violated constraint.
        constraint: &'static str,
    },

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str) -> Self {
        StoreError::NotFound { entity }
    }

    /// Shorthand for a `Conflict` error.
    pub fn conflict(constraint: &'static str) -> Self {
        StoreError::Conflict { constraint }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
