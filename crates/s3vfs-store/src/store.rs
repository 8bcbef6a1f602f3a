//! The [`ObjectStore`] trait.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::model::{CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta};

/// A flat, key-addressed object store with S3 semantics.
///
/// Implementations must be safe to share between tasks: the filesystem layer
/// hands one `Arc<dyn ObjectStore>` to every chrooted view and every open
/// file. No method retries on its own; retry policy belongs to the backend's
/// client or to the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Start reading an object. The body is streamed, not buffered.
    ///
    /// Returns [`crate::StoreError::NoSuchKey`] when the object is absent.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput>;

    /// Fetch an object's metadata without its body.
    ///
    /// Returns [`crate::StoreError::NoSuchKey`] when the object is absent.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta>;

    /// Store `body` under `key`, replacing any previous object. Returns the ETag.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<String>;

    /// Fetch one page of a delimiter-grouped listing.
    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage>;

    /// Server-side copy of `src_key` to `dst_key` within `bucket`.
    async fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Open a multipart upload session for `key`. Returns the upload ID.
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String>;

    /// Upload one numbered part of a multipart session.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart>;

    /// Assemble `parts` (ascending part numbers) into the final object.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()>;

    /// Discard a multipart session and its uploaded parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;
}
