//! A POSIX-like virtual filesystem over an S3-compatible object store.
//!
//! Object stores are flat: a bucket maps keys to immutable blobs. This crate
//! emulates a hierarchical filesystem on top of one bucket so that code
//! written against a conventional file interface can run on object storage.
//!
//! # Architecture
//!
//! ```text
//!   vfs traits (Basic, Dir, Chroot, Symlink, TempFile, Capable)
//!        |
//!        v
//!      S3Fs  -- path::resolve -->  object keys under a root prefix
//!        |
//!        +--> File handles (streaming / buffered read, buffered / multipart write)
//!        +--> DirectoryLister (ListObjectsV2 with delimiter)
//!        |
//!        v
//!   s3vfs_store::ObjectStore (AWS S3, in-memory, decorators)
//! ```
//!
//! Directories do not exist in the store. They are implied by keys that
//! share a prefix up to the separator, and show up in listings as common
//! prefixes. Symbolic links, locking, truncation and temporary files cannot
//! be expressed on object storage and report [`FsError::Unsupported`].

pub mod config;
pub mod error;
pub mod file;
pub mod filesystem;
pub mod flags;
pub mod info;
pub mod lister;
pub mod path;
pub mod vfs;

pub use config::{FsConfig, ReadStrategy};
pub use error::{FsError, FsResult};
pub use file::{
    BufferedReadFile, BufferedWriteFile, File, MultipartWriteFile, PartSequence,
    StreamingReadFile,
};
pub use filesystem::S3Fs;
pub use flags::{Capabilities, O_RDONLY, O_WRMULTIPART, O_WRONLY, OpenMode};
pub use info::{FileMode, ObjectInfo};
pub use lister::DirectoryLister;
pub use vfs::{Basic, Capable, Chroot, Dir, Filesystem, Symlink, TempFile};
