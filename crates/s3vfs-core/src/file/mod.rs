//! Open file handles.
//!
//! A handle is created by [`crate::S3Fs::open_file`] in exactly one mode and
//! keeps that mode for its whole life. Each mode has its own concrete type
//! behind the [`File`] trait:
//!
//! | Mode | Type | Store traffic |
//! |------|------|---------------|
//! | read (streaming) | [`StreamingReadFile`] | one `GetObject`, body consumed in order |
//! | read (buffered) | [`BufferedReadFile`] | one `GetObject`, body loaded on open |
//! | write | [`BufferedWriteFile`] | one `PutObject` on close |
//! | multipart write | [`MultipartWriteFile`] | one `UploadPart` per write, completed on close |
//!
//! Every handle goes `Open -> Closed` exactly once, through `close` or
//! `discard`. Any call after that, including a second `close`, fails with
//! [`FsError::AlreadyClosed`].

mod multipart;
mod read;
mod write;

use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use s3vfs_store::{ObjectStore, StoreError, StoreOperation};

pub use multipart::{MultipartWriteFile, PartSequence};
pub use read::{BufferedReadFile, StreamingReadFile};
pub use write::BufferedWriteFile;

use crate::error::{FsError, FsResult};
use crate::flags::OpenMode;

/// An open file on an object store backed filesystem.
#[async_trait]
pub trait File: Send + std::fmt::Debug {
    /// The object key this handle addresses.
    fn name(&self) -> &str;

    /// The mode the handle was opened in.
    fn mode(&self) -> OpenMode;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;

    /// Read into `buf`, returning the number of bytes read; `0` at end of file.
    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;

    /// Read into `buf` starting at `offset`, without moving the cursor.
    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize>;

    /// Move the read cursor, returning the new position.
    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64>;

    /// Write `buf`, returning the number of bytes accepted.
    async fn write(&mut self, buf: &[u8]) -> FsResult<usize>;

    /// Finish the handle. Writers make their data durable here.
    async fn close(&mut self) -> FsResult<()>;

    /// Close the handle without making written data durable. Readers behave
    /// as on `close`; a multipart writer aborts its session.
    async fn discard(&mut self) -> FsResult<()>;

    /// Not supported on object storage.
    fn lock(&mut self) -> FsResult<()> {
        unsupported(&*self, "lock")
    }

    /// Not supported on object storage.
    fn unlock(&mut self) -> FsResult<()> {
        unsupported(&*self, "unlock")
    }

    /// Not supported on object storage.
    fn truncate(&mut self, _size: u64) -> FsResult<()> {
        unsupported(&*self, "truncate")
    }

    /// Read until end of file.
    async fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

/// `AlreadyClosed` on a closed handle, `Unsupported` otherwise.
fn unsupported<F: File + ?Sized>(file: &F, operation: &'static str) -> FsResult<()> {
    if file.is_closed() {
        return Err(FsError::AlreadyClosed {
            name: file.name().to_owned(),
        });
    }
    Err(FsError::Unsupported { operation })
}

/// State every handle carries: where it points and whether it is closed.
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) bucket: String,
    pub(crate) key: String,
    closed: bool,
}

impl Handle {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, bucket: String, key: String) -> Self {
        Self {
            store,
            bucket,
            key,
            closed: false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::AlreadyClosed {
                name: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Transition to closed; fails if the handle already was.
    pub(crate) fn mark_closed(&mut self) -> FsResult<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }

    pub(crate) fn store_error(&self, operation: StoreOperation, err: StoreError) -> FsError {
        FsError::from_store(operation, self.key.as_str(), err)
    }

    pub(crate) fn read_only(&self) -> FsResult<usize> {
        self.ensure_open()?;
        Err(FsError::ReadOnlyViolation {
            name: self.key.clone(),
        })
    }

    pub(crate) fn write_only(&self) -> FsResult<usize> {
        self.ensure_open()?;
        Err(FsError::WriteOnlyViolation {
            name: self.key.clone(),
        })
    }

    pub(crate) fn unsupported<T>(&self, operation: &'static str) -> FsResult<T> {
        self.ensure_open()?;
        Err(FsError::Unsupported { operation })
    }
}
