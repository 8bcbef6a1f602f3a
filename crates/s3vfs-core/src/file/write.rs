use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use s3vfs_store::{ObjectStore, StoreOperation};
use tracing::{debug, trace};

use super::{File, Handle};
use crate::error::FsResult;
use crate::flags::OpenMode;

/// A file opened for writing that buffers everything in memory and uploads
/// it with a single `PutObject` on close.
///
/// Nothing reaches the store before `close`. If that upload fails the error
/// is returned, the handle is closed anyway and the buffered data is lost.
#[derive(Debug)]
pub struct BufferedWriteFile {
    handle: Handle,
    buf: BytesMut,
}

impl BufferedWriteFile {
    /// Create a writer for `key`. No store call is made.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, key: String) -> Self {
        Self {
            handle: Handle::new(store, bucket, key),
            buf: BytesMut::new(),
        }
    }

    /// Number of bytes buffered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[async_trait]
impl File for BufferedWriteFile {
    fn name(&self) -> &str {
        &self.handle.key
    }

    fn mode(&self) -> OpenMode {
        OpenMode::Write
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn read(&mut self, _buf: &mut [u8]) -> FsResult<usize> {
        self.handle.write_only()
    }

    async fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> FsResult<usize> {
        self.handle.write_only()
    }

    async fn seek(&mut self, _pos: SeekFrom) -> FsResult<u64> {
        self.handle.unsupported("seek")
    }

    async fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.handle.ensure_open()?;
        self.buf.extend_from_slice(buf);
        trace!(key = %self.handle.key, len = buf.len(), total = self.buf.len(), "buffered write");
        Ok(buf.len())
    }

    async fn close(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        let body = std::mem::take(&mut self.buf).freeze();
        let size = body.len();

        self.handle
            .store
            .put_object(&self.handle.bucket, &self.handle.key, body)
            .await
            .map_err(|e| self.handle.store_error(StoreOperation::PutObject, e))?;

        debug!(
            bucket = %self.handle.bucket,
            key = %self.handle.key,
            size,
            "uploaded buffered file",
        );
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        let dropped = std::mem::take(&mut self.buf).len();
        debug!(key = %self.handle.key, dropped, "discarded buffered file");
        Ok(())
    }
}
