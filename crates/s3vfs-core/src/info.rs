//! Metadata of listed and stat-ed entries.

use std::fmt;

use chrono::{DateTime, Utc};
use s3vfs_store::ObjectMeta;

/// Unix-style file mode: permission bits plus a directory flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    /// The directory bit.
    pub const DIR: u32 = 1 << 31;
    /// Permission bits reported for objects.
    pub const FILE_PERM: u32 = 0o666;

    /// Mode of a regular file.
    #[must_use]
    pub const fn file() -> Self {
        Self(Self::FILE_PERM)
    }

    /// Mode of an emulated directory. Directories carry no permission bits.
    #[must_use]
    pub const fn dir() -> Self {
        Self(Self::DIR)
    }

    /// Whether the directory bit is set.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR != 0
    }

    /// The permission bits.
    #[must_use]
    pub const fn perm(self) -> u32 {
        self.0 & 0o777
    }

    /// The raw mode value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { 'd' } else { '-' };
        write!(f, "{kind}")?;
        for shift in [6, 3, 0] {
            let bits = (self.0 >> shift) & 0o7;
            let r = if bits & 0o4 != 0 { 'r' } else { '-' };
            let w = if bits & 0o2 != 0 { 'w' } else { '-' };
            let x = if bits & 0o1 != 0 { 'x' } else { '-' };
            write!(f, "{r}{w}{x}")?;
        }
        Ok(())
    }
}

/// A file or emulated directory, as returned by `read_dir` and `stat`.
///
/// `name` is the full object key for files and the full common prefix
/// (separator included) for directories. Directories have size 0 and no
/// modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key or common prefix.
    pub name: String,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// File mode.
    pub mode: FileMode,
    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    /// Entry for a stored object.
    #[must_use]
    pub fn file(meta: ObjectMeta) -> Self {
        Self {
            name: meta.key,
            size: meta.size,
            mode: FileMode::file(),
            modified: meta.last_modified,
        }
    }

    /// Entry for an emulated directory named by `prefix`.
    #[must_use]
    pub fn directory(prefix: impl Into<String>) -> Self {
        Self {
            name: prefix.into(),
            size: 0,
            mode: FileMode::dir(),
            modified: None,
        }
    }

    /// Whether this entry is an emulated directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// The last segment of [`Self::name`], without a trailing separator.
    ///
    /// ```
    /// use s3vfs_core::ObjectInfo;
    ///
    /// assert_eq!(ObjectInfo::directory("a/b/").base_name("/"), "b");
    /// ```
    #[must_use]
    pub fn base_name(&self, separator: &str) -> &str {
        if separator.is_empty() {
            return &self.name;
        }
        let trimmed = self.name.strip_suffix(separator).unwrap_or(&self.name);
        trimmed
            .rsplit_once(separator)
            .map_or(trimmed, |(_, last)| last)
    }
}
