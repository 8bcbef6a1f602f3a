//! Store error types.
//!
//! [`StoreError`] is what every [`crate::ObjectStore`] call returns on
//! failure. Backends map their native failures onto it: a missing object is
//! always [`StoreError::NoSuchKey`] regardless of whether it came from
//! `GetObject` (`NoSuchKey`) or `HeadObject` (a bare 404), so callers can test
//! for absence without knowing which backend they run against.
//!
//! # Usage
//!
//! ```
//! use s3vfs_store::error::StoreError;
//!
//! let err = StoreError::NoSuchKey {
//!     key: "docs/readme.md".to_owned(),
//! };
//! assert!(err.is_not_found());
//! assert!(err.to_string().contains("docs/readme.md"));
//! ```

use std::time::Duration;

use crate::model::StoreOperation;

/// Boxed error used to carry a backend's original failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The multipart upload does not exist (never created, completed or aborted).
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// One or more parts named in a completion request are missing or stale.
    #[error("One or more of the specified parts could not be found")]
    InvalidPart,

    /// An argument was rejected by the store.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The call did not finish before the configured deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: StoreOperation,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// A failure produced by [`crate::FailingStore`].
    #[error("injected failure for {operation}")]
    Injected {
        /// The operation that was failed on purpose.
        operation: StoreOperation,
    },

    /// The backend reported a transport or service failure.
    #[error("{operation} failed: {message}")]
    Service {
        /// The operation that failed.
        operation: StoreOperation,
        /// Rendered description of the failure, including its cause chain.
        message: String,
        /// The original failure.
        #[source]
        source: BoxError,
    },

    /// The backend answered, but without a field the protocol requires.
    #[error("{operation} returned a malformed response: {message}")]
    MalformedResponse {
        /// The operation whose response was malformed.
        operation: StoreOperation,
        /// What was missing or wrong.
        message: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    /// Wrap a backend failure for `operation`.
    pub fn service(operation: StoreOperation, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self::Service {
            operation,
            message: source.to_string(),
            source,
        }
    }

    /// Whether this error means the addressed object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. })
    }
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_not_found_only_for_missing_keys() {
        let missing = StoreError::NoSuchKey {
            key: "a/b".to_owned(),
        };
        assert!(missing.is_not_found());

        let bucket = StoreError::NoSuchBucket {
            bucket: "gone".to_owned(),
        };
        assert!(!bucket.is_not_found());
        assert!(!StoreError::InvalidPart.is_not_found());
    }

    #[test]
    fn test_should_keep_service_error_source() {
        let io = std::io::Error::other("connection reset");
        let err = StoreError::service(StoreOperation::PutObject, io);

        assert!(err.to_string().contains("PutObject"));
        assert!(err.to_string().contains("connection reset"));
        let source = std::error::Error::source(&err);
        assert!(source.is_some_and(|s| s.to_string() == "connection reset"));
    }

    #[test]
    fn test_should_format_timeout() {
        let err = StoreError::Timeout {
            operation: StoreOperation::ListObjects,
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "ListObjects timed out after 250ms");
    }
}
