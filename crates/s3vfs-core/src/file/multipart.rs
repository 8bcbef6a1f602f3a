use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use s3vfs_store::{CompletedPart, ObjectStore, StoreOperation};
use tracing::{debug, trace, warn};

use super::{File, Handle};
use crate::error::FsResult;
use crate::flags::OpenMode;

/// Part numbers of one multipart session and the parts accepted so far.
///
/// Numbers start at 1 and advance only when a part is recorded, so a failed
/// upload is retried under the same number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSequence {
    next: i32,
    completed: Vec<CompletedPart>,
}

impl Default for PartSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl PartSequence {
    /// An empty sequence; the first part is number 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 1,
            completed: Vec::new(),
        }
    }

    /// The number the next part will be uploaded under.
    #[must_use]
    pub fn next_number(&self) -> i32 {
        self.next
    }

    /// Record an accepted part and advance the counter.
    pub fn record(&mut self, part: CompletedPart) {
        self.next += 1;
        self.completed.push(part);
    }

    /// Accepted parts in ascending part-number order.
    #[must_use]
    pub fn parts(&self) -> &[CompletedPart] {
        &self.completed
    }

    /// Number of accepted parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// Whether no part was accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

/// A file opened for writing through a multipart upload.
///
/// Opening creates the upload session. Every non-empty `write` uploads its
/// bytes as the next part, and `close` completes the session. Part sizing is
/// up to the caller: S3 rejects completion if a part other than the last one
/// is below the store's minimum part size.
#[derive(Debug)]
pub struct MultipartWriteFile {
    handle: Handle,
    upload_id: String,
    parts: PartSequence,
    abort_on_failure: bool,
}

impl MultipartWriteFile {
    /// Start a multipart upload for `key`.
    ///
    /// With `abort_on_failure`, a failed completion on close aborts the
    /// session instead of leaving it behind.
    pub async fn create(
        store: Arc<dyn ObjectStore>,
        bucket: String,
        key: String,
        abort_on_failure: bool,
    ) -> FsResult<Self> {
        let handle = Handle::new(store, bucket, key);
        let upload_id = handle
            .store
            .create_multipart_upload(&handle.bucket, &handle.key)
            .await
            .map_err(|e| handle.store_error(StoreOperation::CreateMultipartUpload, e))?;

        debug!(
            bucket = %handle.bucket,
            key = %handle.key,
            upload_id = %upload_id,
            "started multipart upload",
        );
        Ok(Self {
            handle,
            upload_id,
            parts: PartSequence::new(),
            abort_on_failure,
        })
    }

    /// The store's ID for the upload session.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// The parts uploaded so far.
    #[must_use]
    pub fn parts(&self) -> &PartSequence {
        &self.parts
    }

    async fn abort(&self) -> FsResult<()> {
        let h = &self.handle;
        h.store
            .abort_multipart_upload(&h.bucket, &h.key, &self.upload_id)
            .await
            .map_err(|e| h.store_error(StoreOperation::AbortMultipartUpload, e))?;
        debug!(key = %h.key, upload_id = %self.upload_id, "aborted multipart upload");
        Ok(())
    }

    /// Close without any part: S3 cannot complete an empty session, so the
    /// session is dropped and an empty object stored instead. A failed abort
    /// is returned before anything is stored.
    async fn close_empty(&self) -> FsResult<()> {
        self.abort().await?;
        let h = &self.handle;
        h.store
            .put_object(&h.bucket, &h.key, Bytes::new())
            .await
            .map_err(|e| h.store_error(StoreOperation::PutObject, e))?;
        debug!(bucket = %h.bucket, key = %h.key, "stored empty object for partless upload");
        Ok(())
    }
}

#[async_trait]
impl File for MultipartWriteFile {
    fn name(&self) -> &str {
        &self.handle.key
    }

    fn mode(&self) -> OpenMode {
        OpenMode::MultipartWrite
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
        if buf.is_empty() {
            return Ok(0);
        }

        let h = &self.handle;
        let part_number = self.parts.next_number();
        let part = h
            .store
            .upload_part(
                &h.bucket,
                &h.key,
                &self.upload_id,
                part_number,
                Bytes::copy_from_slice(buf),
            )
            .await
            .map_err(|e| h.store_error(StoreOperation::UploadPart, e))?;

        trace!(
            key = %h.key,
            upload_id = %self.upload_id,
            part_number,
            len = buf.len(),
            "uploaded part",
        );
        self.parts.record(part);
        Ok(buf.len())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        self.abort().await
    }

    async fn close(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        if self.parts.is_empty() {
            return self.close_empty().await;
        }

        let h = &self.handle;
        let completed = h
            .store
            .complete_multipart_upload(&h.bucket, &h.key, &self.upload_id, self.parts.parts())
            .await;

        match completed {
            Ok(()) => {
                debug!(
                    bucket = %h.bucket,
                    key = %h.key,
                    parts = self.parts.len(),
                    "completed multipart upload",
                );
                Ok(())
            }
            Err(e) => {
                let err = h.store_error(StoreOperation::CompleteMultipartUpload, e);
                if self.abort_on_failure {
                    if let Err(abort_err) = self.abort().await {
                        warn!(
                            key = %h.key,
                            upload_id = %self.upload_id,
                            error = %abort_err,
                            "failed to abort multipart upload",
                        );
                    }
                } else {
                    warn!(
                        key = %h.key,
                        upload_id = %self.upload_id,
                        "multipart upload left incomplete",
                    );
                }
                Err(err)
            }
        }
    }
}
