//! Fault-injecting decorator for object stores.
//!
//! [`FailingStore`] forwards every call to an inner store unless its
//! [`FailurePolicy`] says the call should fail, in which case it returns
//! [`StoreError::Injected`] without touching the inner store. It is how the
//! filesystem tests reproduce partial failures such as a rename whose copy
//! succeeded but whose delete did not.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta, StoreOperation,
};
use crate::store::ObjectStore;

/// When [`FailingStore`] should fail a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Never fail (passthrough).
    #[default]
    Never,
    /// Fail every call to the listed operations.
    OnOperations(Vec<StoreOperation>),
    /// Let the first `count` calls to `operation` through, fail the rest.
    AfterCalls {
        /// The operation to fail.
        operation: StoreOperation,
        /// Number of calls that still succeed.
        count: usize,
    },
    /// `GetObject` succeeds but its body errors after `chunks` chunks.
    TruncatedBody {
        /// Number of chunks delivered before the error.
        chunks: usize,
    },
}

/// Wraps another store and fails calls according to a [`FailurePolicy`].
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<dyn ObjectStore>,
    policy: Mutex<FailurePolicy>,
    calls: DashMap<StoreOperation, usize>,
}

impl FailingStore {
    /// Wrap `inner` with the given policy.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectStore>, policy: FailurePolicy) -> Self {
        Self {
            inner,
            policy: Mutex::new(policy),
            calls: DashMap::new(),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    /// Replace the policy and reset the call counters.
    pub fn set_policy(&self, policy: FailurePolicy) {
        *self.policy.lock() = policy;
        self.calls.clear();
    }

    /// Number of calls made to `operation`, failed ones included.
    #[must_use]
    pub fn call_count(&self, operation: StoreOperation) -> usize {
        self.calls.get(&operation).map_or(0, |count| *count)
    }

    fn check(&self, operation: StoreOperation) -> StoreResult<()> {
        let seen = {
            let mut count = self.calls.entry(operation).or_insert(0);
            let seen = *count;
            *count += 1;
            seen
        };

        let fail = match &*self.policy.lock() {
            FailurePolicy::Never | FailurePolicy::TruncatedBody { .. } => false,
            FailurePolicy::OnOperations(ops) => ops.contains(&operation),
            FailurePolicy::AfterCalls {
                operation: target,
                count,
            } => *target == operation && seen >= *count,
        };

        if fail {
            debug!(%operation, call = seen + 1, "injecting store failure");
            return Err(StoreError::Injected { operation });
        }
        Ok(())
    }

    fn truncate_after(&self) -> Option<usize> {
        match &*self.policy.lock() {
            FailurePolicy::TruncatedBody { chunks } => Some(*chunks),
            _ => None,
        }
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        self.check(StoreOperation::GetObject)?;
        let out = self.inner.get_object(bucket, key).await?;
        let Some(chunks) = self.truncate_after() else {
            return Ok(out);
        };

        let failure = futures::stream::once(async {
            Err(StoreError::Injected {
                operation: StoreOperation::GetObject,
            })
        });
        Ok(GetObjectOutput {
            meta: out.meta,
            body: Box::pin(out.body.take(chunks).chain(failure)),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        self.check(StoreOperation::HeadObject)?;
        self.inner.head_object(bucket, key).await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<String> {
        self.check(StoreOperation::PutObject)?;
        self.inner.put_object(bucket, key, body).await
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        self.check(StoreOperation::ListObjects)?;
        self.inner.list_objects(request).await
    }

    async fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.check(StoreOperation::CopyObject)?;
        self.inner.copy_object(bucket, src_key, dst_key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.check(StoreOperation::DeleteObject)?;
        self.inner.delete_object(bucket, key).await
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String> {
        self.check(StoreOperation::CreateMultipartUpload)?;
        self.inner.create_multipart_upload(bucket, key).await
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        self.check(StoreOperation::UploadPart)?;
        self.inner
            .upload_part(bucket, key, upload_id, part_number, body)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.check(StoreOperation::CompleteMultipartUpload)?;
        self.inner
            .complete_multipart_upload(bucket, key, upload_id, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.check(StoreOperation::AbortMultipartUpload)?;
        self.inner.abort_multipart_upload(bucket, key, upload_id).await
    }
}
