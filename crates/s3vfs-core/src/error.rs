//! Filesystem error types.
//!
//! Every filesystem and file-handle operation returns [`FsError`]. Store
//! failures are never retried or swallowed: they surface as
//! [`FsError::Store`] carrying the failed operation, the object key and the
//! original [`StoreError`]. A missing object is reported as
//! [`FsError::NotFound`] instead.
//!
//! # Usage
//!
//! ```
//! use s3vfs_core::error::FsError;
//! use s3vfs_store::{StoreError, StoreOperation};
//!
//! let err = FsError::from_store(
//!     StoreOperation::HeadObject,
//!     "docs/a.txt",
//!     StoreError::NoSuchKey { key: "docs/a.txt".to_owned() },
//! );
//! assert!(err.is_not_found());
//! ```

use s3vfs_store::{StoreError, StoreOperation};

/// Error returned by filesystem and file-handle operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The open flag is not one of the supported modes.
    #[error("unsupported open flag: {flag:#x}")]
    UnsupportedFlag {
        /// The rejected flag value.
        flag: i32,
    },

    /// The operation is not supported by an object store backed filesystem.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// The file handle was already closed.
    #[error("file already closed: {name}")]
    AlreadyClosed {
        /// Key of the closed file.
        name: String,
    },

    /// A write was attempted on a file opened for reading.
    #[error("file opened read-only: {name}")]
    ReadOnlyViolation {
        /// Key of the file.
        name: String,
    },

    /// A read was attempted on a file opened for writing.
    #[error("file opened write-only: {name}")]
    WriteOnlyViolation {
        /// Key of the file.
        name: String,
    },

    /// The addressed file does not exist.
    #[error("file does not exist: {path}")]
    NotFound {
        /// The object key that was looked up.
        path: String,
    },

    /// A seek would move the cursor before the start of the file.
    #[error("invalid seek to a negative position in {name}")]
    InvalidSeek {
        /// Key of the file.
        name: String,
    },

    /// A store call failed.
    #[error("{operation} failed for key {key:?}")]
    Store {
        /// The store operation that failed.
        operation: StoreOperation,
        /// The object key the operation addressed.
        key: String,
        /// The store's error.
        #[source]
        source: StoreError,
    },

    /// The filesystem configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FsError {
    /// Map a store failure on `key`, turning a missing object into
    /// [`FsError::NotFound`].
    pub fn from_store(
        operation: StoreOperation,
        key: impl Into<String>,
        source: StoreError,
    ) -> Self {
        let key = key.into();
        if source.is_not_found() {
            Self::NotFound { path: key }
        } else {
            Self::Store {
                operation,
                key,
                source,
            }
        }
    }

    /// Whether this error means the addressed file does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Store { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether this error reports an operation the filesystem cannot perform.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::UnsupportedFlag { .. })
    }
}

/// Convenience result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_missing_key_to_not_found() {
        let err = FsError::from_store(
            StoreOperation::GetObject,
            "a/b",
            StoreError::NoSuchKey {
                key: "a/b".to_owned(),
            },
        );
        assert!(matches!(err, FsError::NotFound { ref path } if path == "a/b"));
    }

    #[test]
    fn test_should_wrap_other_store_errors() {
        let err = FsError::from_store(
            StoreOperation::CopyObject,
            "src",
            StoreError::Injected {
                operation: StoreOperation::CopyObject,
            },
        );
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "CopyObject failed for key \"src\"");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("injected failure for CopyObject"));
    }

    #[test]
    fn test_should_classify_unsupported() {
        assert!(FsError::UnsupportedFlag { flag: 2 }.is_unsupported());
        assert!(
            FsError::Unsupported {
                operation: "symlink"
            }
            .is_unsupported()
        );
        assert!(
            !FsError::AlreadyClosed {
                name: "k".to_owned()
            }
            .is_unsupported()
        );
    }
}
