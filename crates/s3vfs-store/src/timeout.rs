//! Deadline decorator for object stores.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta, StoreOperation,
};
use crate::store::ObjectStore;

/// Wraps another store and fails any call that outlives `timeout`.
///
/// The deadline applies to each RPC separately. For `GetObject` it also
/// applies to every chunk pulled from the body, so a stalled stream surfaces
/// as [`StoreError::Timeout`] instead of hanging the reader. A call that runs
/// past its deadline is dropped, which cancels the underlying request.
#[derive(Debug, Clone)]
pub struct TimeoutStore {
    inner: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl TimeoutStore {
    /// Put a `timeout` deadline on every call to `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The per-call deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run<T>(
        &self,
        operation: StoreOperation,
        fut: impl Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                warn!(%operation, timeout = ?self.timeout, "store call timed out");
                StoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                }
            })?
    }
}

#[async_trait]
impl ObjectStore for TimeoutStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let out = self
            .run(StoreOperation::GetObject, self.inner.get_object(bucket, key))
            .await?;

        let timeout = self.timeout;
        let body = futures::stream::unfold(Some(out.body), move |state| async move {
            let mut body = state?;
            match tokio::time::timeout(timeout, body.next()).await {
                Ok(Some(item)) => Some((item, Some(body))),
                Ok(None) => None,
                Err(_) => Some((
                    Err(StoreError::Timeout {
                        operation: StoreOperation::GetObject,
                        timeout,
                    }),
                    None,
                )),
            }
        });

        Ok(GetObjectOutput {
            meta: out.meta,
            body: Box::pin(body),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        self.run(StoreOperation::HeadObject, self.inner.head_object(bucket, key))
            .await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<String> {
        self.run(
            StoreOperation::PutObject,
            self.inner.put_object(bucket, key, body),
        )
        .await
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        self.run(StoreOperation::ListObjects, self.inner.list_objects(request))
            .await
    }

    async fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.run(
            StoreOperation::CopyObject,
            self.inner.copy_object(bucket, src_key, dst_key),
        )
        .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.run(
            StoreOperation::DeleteObject,
            self.inner.delete_object(bucket, key),
        )
        .await
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String> {
        self.run(
            StoreOperation::CreateMultipartUpload,
            self.inner.create_multipart_upload(bucket, key),
        )
        .await
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        self.run(
            StoreOperation::UploadPart,
            self.inner
                .upload_part(bucket, key, upload_id, part_number, body),
        )
        .await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.run(
            StoreOperation::CompleteMultipartUpload,
            self.inner
                .complete_multipart_upload(bucket, key, upload_id, parts),
        )
        .await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.run(
            StoreOperation::AbortMultipartUpload,
            self.inner.abort_multipart_upload(bucket, key, upload_id),
        )
        .await
    }
}
