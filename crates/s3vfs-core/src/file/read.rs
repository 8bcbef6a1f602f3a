use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::TryStreamExt;
use s3vfs_store::{ByteStream, ObjectStore, StoreError, StoreOperation};
use tracing::{debug, trace};

use super::{File, Handle};
use crate::error::{FsError, FsResult};
use crate::flags::OpenMode;

/// A file opened for reading that consumes the object body as a stream.
///
/// Only forward reads are possible: `read_at` and `seek` report
/// [`FsError::Unsupported`]. Once the body fails, every later `read` fails
/// too; a broken download never turns into end of file.
pub struct StreamingReadFile {
    handle: Handle,
    size: u64,
    body: Option<ByteStream>,
    pending: Bytes,
    failure: Option<String>,
}

impl fmt::Debug for StreamingReadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingReadFile")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("pending", &self.pending.len())
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl StreamingReadFile {
    /// Issue the `GetObject` for `key` and wrap its body.
    pub async fn open(store: Arc<dyn ObjectStore>, bucket: String, key: String) -> FsResult<Self> {
        let handle = Handle::new(store, bucket, key);
        let out = handle
            .store
            .get_object(&handle.bucket, &handle.key)
            .await
            .map_err(|e| handle.store_error(StoreOperation::GetObject, e))?;

        debug!(
            bucket = %handle.bucket,
            key = %handle.key,
            size = out.meta.size,
            "opened streaming reader",
        );
        Ok(Self {
            handle,
            size: out.meta.size,
            body: Some(out.body),
            pending: Bytes::new(),
            failure: None,
        })
    }

    /// Size of the object as reported when it was opened.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[async_trait]
impl File for StreamingReadFile {
    fn name(&self) -> &str {
        &self.handle.key
    }

    fn mode(&self) -> OpenMode {
        OpenMode::Read
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.handle.ensure_open()?;
        if let Some(message) = &self.failure {
            let err = StoreError::Internal(anyhow!("body stream failed earlier: {message}"));
            return Err(self.handle.store_error(StoreOperation::GetObject, err));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            let Some(body) = self.body.as_mut() else {
                return Ok(0);
            };
            match body.try_next().await {
                Ok(Some(chunk)) => {
                    trace!(key = %self.handle.key, len = chunk.len(), "received body chunk");
                    self.pending = chunk;
                }
                Ok(None) => {
                    self.body = None;
                    return Ok(0);
                }
                Err(e) => {
                    self.body = None;
                    self.failure = Some(e.to_string());
                    return Err(self.handle.store_error(StoreOperation::GetObject, e));
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    async fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> FsResult<usize> {
        self.handle.unsupported("read_at")
    }

    async fn seek(&mut self, _pos: SeekFrom) -> FsResult<u64> {
        self.handle.unsupported("seek")
    }

    async fn write(&mut self, _buf: &[u8]) -> FsResult<usize> {
        self.handle.read_only()
    }

    async fn close(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        self.body = None;
        self.pending = Bytes::new();
        debug!(key = %self.handle.key, "closed streaming reader");
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.close().await
    }
}

/// A file opened for reading whose content is loaded completely on open.
///
/// Supports positional reads and seeking.
#[derive(Debug)]
pub struct BufferedReadFile {
    handle: Handle,
    data: Bytes,
    pos: u64,
}

impl BufferedReadFile {
    /// Fetch the whole object at `key`.
    pub async fn open(store: Arc<dyn ObjectStore>, bucket: String, key: String) -> FsResult<Self> {
        let handle = Handle::new(store, bucket, key);
        let data = async {
            let out = handle.store.get_object(&handle.bucket, &handle.key).await?;
            out.collect().await
        }
        .await
        .map_err(|e| handle.store_error(StoreOperation::GetObject, e))?;

        debug!(
            bucket = %handle.bucket,
            key = %handle.key,
            size = data.len(),
            "opened buffered reader",
        );
        Ok(Self {
            handle,
            data,
            pos: 0,
        })
    }

    /// Size of the loaded object.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn copy_from(&self, buf: &mut [u8], offset: u64) -> usize {
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= self.data.len() {
            return 0;
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

#[async_trait]
impl File for BufferedReadFile {
    fn name(&self) -> &str {
        &self.handle.key
    }

    fn mode(&self) -> OpenMode {
        OpenMode::Read
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.handle.ensure_open()?;
        let n = self.copy_from(buf, self.pos);
        self.pos += n as u64;
        Ok(n)
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.handle.ensure_open()?;
        Ok(self.copy_from(buf, offset))
    }

    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.handle.ensure_open()?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size().checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(FsError::InvalidSeek {
                name: self.handle.key.clone(),
            });
        };
        self.pos = target;
        Ok(target)
    }

    async fn write(&mut self, _buf: &[u8]) -> FsResult<usize> {
        self.handle.read_only()
    }

    async fn close(&mut self) -> FsResult<()> {
        self.handle.mark_closed()?;
        self.data = Bytes::new();
        debug!(key = %self.handle.key, "closed buffered reader");
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.close().await
    }
}

#[cfg(test)]
mod tests {
    use s3vfs_store::{FailingStore, FailurePolicy, MemoryStore};

    use super::*;

    async fn store_with(key: &str, body: &'static [u8]) -> Arc<dyn ObjectStore> {
        let store = MemoryStore::with_chunk_size(3);
        store.create_bucket("b");
        store
            .put_object("b", key, Bytes::from_static(body))
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_should_stream_body_in_order() {
        let store = store_with("k", b"hello world").await;
        let mut file = StreamingReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();
        assert_eq!(file.size(), 11);

        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"he");
        assert_eq!(file.read_to_end().await.unwrap(), b"llo world");
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_should_fail_open_when_missing() {
        let store = store_with("k", b"x").await;
        let err = StreamingReadFile::open(store.clone(), "b".into(), "nope".into())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound { ref path } if path == "nope"));

        let err = BufferedReadFile::open(store, "b".into(), "nope".into())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_reject_random_access_on_stream() {
        let store = store_with("k", b"abc").await;
        let mut file = StreamingReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();

        let mut buf = [0u8; 1];
        assert!(matches!(
            file.read_at(&mut buf, 1).await,
            Err(FsError::Unsupported {
                operation: "read_at"
            })
        ));
        assert!(matches!(
            file.seek(SeekFrom::Start(1)).await,
            Err(FsError::Unsupported { operation: "seek" })
        ));
        assert!(matches!(
            file.write(b"x").await,
            Err(FsError::ReadOnlyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_surface_mid_stream_errors() {
        let memory = store_with("k", b"abcdefghi").await;
        let store: Arc<dyn ObjectStore> = Arc::new(FailingStore::new(
            memory,
            FailurePolicy::TruncatedBody { chunks: 1 },
        ));
        let mut file = StreamingReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(file.read(&mut buf).await.unwrap(), 3);
        let err = file.read(&mut buf).await.unwrap_err();
        assert!(matches!(
            err,
            FsError::Store {
                operation: StoreOperation::GetObject,
                ..
            }
        ));

        let err = file.read(&mut buf).await.unwrap_err();
        assert!(matches!(
            err,
            FsError::Store {
                operation: StoreOperation::GetObject,
                ..
            }
        ));
        assert!(file.read_to_end().await.is_err());
    }

    #[tokio::test]
    async fn test_should_reject_use_after_close() {
        let store = store_with("k", b"abc").await;
        let mut file = StreamingReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();
        file.close().await.unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            file.read(&mut buf).await,
            Err(FsError::AlreadyClosed { .. })
        ));
        assert!(matches!(
            file.close().await,
            Err(FsError::AlreadyClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_seek_and_read_at_when_buffered() {
        let store = store_with("k", b"0123456789").await;
        let mut file = BufferedReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(file.read_at(&mut buf, 4).await.unwrap(), 3);
        assert_eq!(&buf, b"456");

        assert_eq!(file.seek(SeekFrom::End(-2)).await.unwrap(), 8);
        assert_eq!(file.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"89");

        assert_eq!(file.seek(SeekFrom::Start(1)).await.unwrap(), 1);
        assert_eq!(file.seek(SeekFrom::Current(2)).await.unwrap(), 3);
        assert_eq!(file.read(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf, b"345");

        assert!(matches!(
            file.seek(SeekFrom::Current(-100)).await,
            Err(FsError::InvalidSeek { .. })
        ));
        assert_eq!(file.read_at(&mut buf, 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_should_reject_locking_and_truncate() {
        let store = store_with("k", b"abc").await;
        let mut file = BufferedReadFile::open(store, "b".into(), "k".into())
            .await
            .unwrap();
        assert!(file.lock().unwrap_err().is_unsupported());
        assert!(file.unlock().unwrap_err().is_unsupported());
        assert!(file.truncate(0).unwrap_err().is_unsupported());

        file.close().await.unwrap();
        assert!(matches!(file.lock(), Err(FsError::AlreadyClosed { .. })));
        assert!(matches!(file.unlock(), Err(FsError::AlreadyClosed { .. })));
        assert!(matches!(
            file.truncate(0),
            Err(FsError::AlreadyClosed { .. })
        ));
    }
}
