//! Filesystem configuration.
//!
//! Provides [`FsConfig`], passed to [`crate::S3Fs::new`]. The core never
//! reads the process environment on its own; callers that want environment
//! driven configuration use [`FsConfig::from_env`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{FsError, FsResult};

/// How files opened for reading fetch their content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    /// Consume the object body as a forward-only stream.
    #[default]
    Streaming,
    /// Load the whole object on open; enables `read_at` and `seek`.
    Buffered,
}

impl fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::Buffered => f.write_str("buffered"),
        }
    }
}

impl FromStr for ReadStrategy {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("streaming") {
            Ok(Self::Streaming)
        } else if s.eq_ignore_ascii_case("buffered") {
            Ok(Self::Buffered)
        } else {
            Err(FsError::Config {
                message: format!("unknown read strategy: {s}"),
            })
        }
    }
}

/// Filesystem configuration.
///
/// # Examples
///
/// ```
/// use s3vfs_core::config::{FsConfig, ReadStrategy};
///
/// let config = FsConfig::builder()
///     .bucket("media".into())
///     .root("users/alice".into())
///     .build();
/// assert_eq!(config.separator, "/");
/// assert_eq!(config.read_strategy, ReadStrategy::Streaming);
/// assert!(config.operation_timeout().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct FsConfig {
    /// Bucket holding the filesystem. Must be non-empty.
    #[builder(default)]
    pub bucket: String,

    /// Path separator used to emulate directories. Must be non-empty.
    #[builder(default = String::from("/"))]
    pub separator: String,

    /// Key prefix the filesystem is rooted at.
    #[builder(default)]
    pub root: String,

    /// How files opened for reading fetch their content.
    #[builder(default)]
    pub read_strategy: ReadStrategy,

    /// Abort the multipart session when completing it fails on close.
    #[builder(default = false)]
    pub abort_on_close_failure: bool,

    /// Deadline for every single store call, in milliseconds.
    #[builder(default)]
    pub operation_timeout_ms: Option<u64>,

    /// Write a zero-byte marker object on `mkdir_all`.
    #[builder(default = false)]
    pub directory_markers: bool,

    /// Entries requested per listing page; the store default when unset.
    #[builder(default)]
    pub list_page_size: Option<i32>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            separator: String::from("/"),
            root: String::new(),
            read_strategy: ReadStrategy::Streaming,
            abort_on_close_failure: false,
            operation_timeout_ms: None,
            directory_markers: false,
            list_page_size: None,
            log_level: String::from("info"),
        }
    }
}

impl FsConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3VFS_BUCKET` | (empty) |
    /// | `S3VFS_SEPARATOR` | `/` |
    /// | `S3VFS_ROOT` | (empty) |
    /// | `S3VFS_READ_STRATEGY` | `streaming` |
    /// | `S3VFS_ABORT_ON_CLOSE_FAILURE` | `false` |
    /// | `S3VFS_OPERATION_TIMEOUT_MS` | (none) |
    /// | `S3VFS_DIRECTORY_MARKERS` | `false` |
    /// | `S3VFS_LIST_PAGE_SIZE` | (none) |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Unparseable numeric or strategy values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("S3VFS_BUCKET") {
            config.bucket = v;
        }
        if let Ok(v) = std::env::var("S3VFS_SEPARATOR") {
            config.separator = v;
        }
        if let Ok(v) = std::env::var("S3VFS_ROOT") {
            config.root = v;
        }
        if let Ok(v) = std::env::var("S3VFS_READ_STRATEGY") {
            if let Ok(strategy) = v.parse() {
                config.read_strategy = strategy;
            }
        }
        if let Ok(v) = std::env::var("S3VFS_ABORT_ON_CLOSE_FAILURE") {
            config.abort_on_close_failure = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("S3VFS_OPERATION_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                config.operation_timeout_ms = Some(ms);
            }
        }
        if let Ok(v) = std::env::var("S3VFS_DIRECTORY_MARKERS") {
            config.directory_markers = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("S3VFS_LIST_PAGE_SIZE") {
            if let Ok(n) = v.parse::<i32>() {
                config.list_page_size = Some(n);
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The per-call store deadline, if one is configured.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Check the settings a filesystem cannot work without.
    pub fn validate(&self) -> FsResult<()> {
        if self.bucket.is_empty() {
            return Err(FsError::Config {
                message: "bucket must not be empty".to_owned(),
            });
        }
        if self.separator.is_empty() {
            return Err(FsError::Config {
                message: "separator must not be empty".to_owned(),
            });
        }
        if self.list_page_size.is_some_and(|n| n <= 0) {
            return Err(FsError::Config {
                message: "list page size must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
