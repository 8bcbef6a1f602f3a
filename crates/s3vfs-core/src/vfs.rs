//! The filesystem interface.
//!
//! The traits split the surface the same way callers consume it: [`Basic`]
//! file operations, [`Dir`] listing, [`Chroot`] scoping, the [`Symlink`] and
//! [`TempFile`] families (which an object store cannot provide) and
//! [`Capable`] feature discovery. [`Filesystem`] is implemented for every
//! type that has all of them.

use async_trait::async_trait;

use crate::error::FsResult;
use crate::file::File;
use crate::flags::Capabilities;
use crate::info::ObjectInfo;

/// Opening, inspecting, moving and deleting files.
#[async_trait]
pub trait Basic: Send + Sync {
    /// Open `path` for writing, replacing any existing file on close.
    async fn create(&self, path: &str) -> FsResult<Box<dyn File>>;

    /// Open `path` for reading.
    async fn open(&self, path: &str) -> FsResult<Box<dyn File>>;

    /// Open `path` in the mode selected by `flag`. `perm` is accepted for
    /// interface compatibility and ignored.
    async fn open_file(&self, path: &str, flag: i32, perm: u32) -> FsResult<Box<dyn File>>;

    /// Describe the file or directory at `path`.
    async fn stat(&self, path: &str) -> FsResult<ObjectInfo>;

    /// Move `from` to `to`, replacing `to` if it exists.
    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Delete the file at `path`. Removing a missing file succeeds.
    async fn remove(&self, path: &str) -> FsResult<()>;

    /// Join path elements with this filesystem's separator.
    fn join(&self, elements: &[&str]) -> String;
}

/// Directory operations.
#[async_trait]
pub trait Dir: Send + Sync {
    /// List the direct children of the directory at `path`.
    async fn read_dir(&self, path: &str) -> FsResult<Vec<ObjectInfo>>;

    /// Make sure the directory at `path` exists.
    async fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()>;
}

/// Scoping a filesystem to a subtree.
pub trait Chroot {
    /// A filesystem rooted at `path` relative to the current root.
    fn chroot(&self, path: &str) -> FsResult<Self>
    where
        Self: Sized;

    /// The current root.
    fn root(&self) -> &str;
}

/// Symbolic links.
#[async_trait]
pub trait Symlink: Send + Sync {
    /// Describe `path` without following links.
    async fn lstat(&self, path: &str) -> FsResult<ObjectInfo>;

    /// Create `link` pointing to `target`.
    async fn symlink(&self, target: &str, link: &str) -> FsResult<()>;

    /// The target of the link at `link`.
    async fn readlink(&self, link: &str) -> FsResult<String>;
}

/// Temporary files.
#[async_trait]
pub trait TempFile: Send + Sync {
    /// Create a new temporary file in `dir` whose name starts with `prefix`.
    async fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn File>>;
}

/// Feature discovery.
pub trait Capable {
    /// What this filesystem supports.
    fn capabilities(&self) -> Capabilities;
}

/// The complete filesystem interface.
pub trait Filesystem: Basic + Dir + Chroot + Symlink + TempFile + Capable {}

impl<T> Filesystem for T where T: Basic + Dir + Chroot + Symlink + TempFile + Capable {}
