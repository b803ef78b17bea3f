//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every fallible operation in the engine returns this type; callers
/// pattern-match on the variant to decide what the user gets to see.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Invalid input supplied internally (empty identity, unknown code,
    /// malformed script). Fatal to the operation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A user record was expected but is absent.
    #[error("user not found: {0}")]
    NotFound(String),

    /// A transactional or backend failure while reading or writing.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The persistence backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
}

impl DomainError {
    /// Returns a stable machine-readable name for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "user_not_found",
            Self::Persistence(_) => "persistence_error",
            Self::Connection(_) => "connection_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(DomainError::Validation("x".into()).kind(), "validation_error");
        assert_eq!(DomainError::NotFound("x".into()).kind(), "user_not_found");
        assert_eq!(DomainError::Persistence("x".into()).kind(), "persistence_error");
        assert_eq!(DomainError::Connection("x".into()).kind(), "connection_error");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = DomainError::NotFound("42".into());
        assert_eq!(err.to_string(), "user not found: 42");
    }
}
