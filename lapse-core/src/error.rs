//! Error types for lapse.
//!
//! Only two kinds ever reach a caller of a table operation: a missing key and
//! a duplicate key. The runtime variant is raised at construction time only.

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for all cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Read or delete against a key that is not in the table.
    #[error("key not found in cache")]
    KeyNotFound,

    /// Add against a key that is already in the table.
    #[error("key already exists in cache")]
    KeyAlreadyExists,

    /// A table or registry was constructed outside a Tokio runtime.
    ///
    /// The sweep timer is a Tokio task, so a runtime handle is required.
    #[error("no Tokio runtime available to drive the expiration sweep")]
    RuntimeUnavailable,
}

impl CacheError {
    /// Returns true for the caller-visible key errors.
    pub fn is_key_error(&self) -> bool {
        matches!(self, CacheError::KeyNotFound | CacheError::KeyAlreadyExists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CacheError::KeyNotFound, "key not found in cache")]
    #[test_case(CacheError::KeyAlreadyExists, "key already exists in cache")]
    fn test_error_display(err: CacheError, expected: &str) {
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_error_classification() {
        assert!(CacheError::KeyNotFound.is_key_error());
        assert!(CacheError::KeyAlreadyExists.is_key_error());
        assert!(!CacheError::RuntimeUnavailable.is_key_error());
    }

    #[test]
    fn test_result_alias_propagates() {
        fn lookup(present: bool) -> Result<u8> {
            if present {
                Ok(7)
            } else {
                Err(CacheError::KeyNotFound)
            }
        }

        fn outer() -> Result<u8> {
            let v = lookup(false)?;
            Ok(v + 1)
        }

        assert_eq!(lookup(true), Ok(7));
        assert_eq!(outer(), Err(CacheError::KeyNotFound));
    }
}
