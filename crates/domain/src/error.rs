//! Domain error taxonomy.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// The HTTP layer maps these onto status codes: `Validation` → 400,
/// `Authentication` → 401, `Permission` → 403, `NotFound` → 404,
/// `Conflict` → 409, `Storage` and `Internal` → 500. Messages never contain passwords
/// or token values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or conflicting input, localized to a field.
    #[error("{field}: {message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A referenced entity does not exist (or is hidden from the actor).
    #[error("{entity} not found")]
    NotFound {
        /// Entity name ("user", "product", "order", ...).
        entity: &'static str,
    },

    /// Credentials did not resolve to an actor.
    #[error("{0}")]
    Authentication(String),

    /// The actor is known but not allowed to do this.
    #[error("{0}")]
    Permission(String),

    /// A storage-level uniqueness rule was violated.
    #[error("conflict: {constraint}")]
    Conflict {
        /// Name of the violated constraint.
        constraint: &'static str,
    },

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// Unexpected internal failure (e.g. password hashing).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for a field-level validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str) -> Self {
        DomainError::NotFound { entity }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity } => DomainError::NotFound { entity },
            StoreError::Conflict { constraint } => DomainError::Conflict { constraint },
            StoreError::Database(_) => DomainError::Storage(e),
        }
    }
}

/// Result alias for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_domain_not_found() {
        let err: DomainError = StoreError::not_found("product").into();
        assert!(matches!(err, DomainError::NotFound { entity: "product" }));
    }

    #[test]
    fn store_conflict_maps_to_domain_conflict() {
        let err: DomainError = StoreError::conflict("users_email_key").into();
        assert!(matches!(
            err,
            DomainError::Conflict {
                constraint: "users_email_key"
            }
        ));
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = DomainError::validation("password", "too short");
        assert_eq!(err.to_string(), "password: too short");
    }
}
