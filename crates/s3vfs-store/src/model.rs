//! Request and response types shared by every store backend.

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use typed_builder::TypedBuilder;

use crate::error::StoreResult;

/// A forward-only stream of object body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

// ---------------------------------------------------------------------------
// StoreOperation
// ---------------------------------------------------------------------------

/// The store RPCs, used to label errors, log lines and injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `GetObject`.
    GetObject,
    /// `HeadObject`.
    HeadObject,
    /// `PutObject`.
    PutObject,
    /// `ListObjectsV2`.
    ListObjects,
    /// `CopyObject`.
    CopyObject,
    /// `DeleteObject`.
    DeleteObject,
    /// `CreateMultipartUpload`.
    CreateMultipartUpload,
    /// `UploadPart`.
    UploadPart,
    /// `CompleteMultipartUpload`.
    CompleteMultipartUpload,
    /// `AbortMultipartUpload`.
    AbortMultipartUpload,
}

impl StoreOperation {
    /// The S3 API name of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::PutObject => "PutObject",
            Self::ListObjects => "ListObjects",
            Self::CopyObject => "CopyObject",
            Self::DeleteObject => "DeleteObject",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Metadata of a stored object, as returned by `HeadObject` and listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// The full object key.
    pub key: String,
    /// Size of the object body in bytes.
    pub size: u64,
    /// Last modification time, when the store reports one.
    pub last_modified: Option<DateTime<Utc>>,
    /// The entity tag (quoted), when the store reports one.
    pub etag: Option<String>,
}

/// Response of `GetObject`: the object's metadata and its live body.
pub struct GetObjectOutput {
    /// Metadata of the object being read.
    pub meta: ObjectMeta,
    /// The body, consumed front to back.
    pub body: ByteStream,
}

impl fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl GetObjectOutput {
    /// Drain the body into a single buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use s3vfs_store::{MemoryStore, ObjectStore};
    ///
    /// # tokio_test::block_on(async {
    /// let store = MemoryStore::new();
    /// store.create_bucket("docs");
    /// store.put_object("docs", "a.txt", Bytes::from("hello")).await.unwrap();
    ///
    /// let out = store.get_object("docs", "a.txt").await.unwrap();
    /// assert_eq!(out.collect().await.unwrap().as_ref(), b"hello");
    /// # });
    /// ```
    pub async fn collect(self) -> StoreResult<Bytes> {
        let capacity = usize::try_from(self.meta.size).unwrap_or(0);
        let buf = self
            .body
            .try_fold(BytesMut::with_capacity(capacity), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await?;
        Ok(buf.freeze())
    }
}

/// A part accepted by `UploadPart`, quoted back in `CompleteMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// The 1-based part number.
    pub part_number: i32,
    /// The entity tag returned for the part.
    pub etag: String,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A single `ListObjectsV2` page request.
///
/// # Examples
///
/// ```
/// use s3vfs_store::ListRequest;
///
/// let req = ListRequest::builder()
///     .bucket("docs")
///     .prefix("reports/")
///     .delimiter("/")
///     .build();
/// assert_eq!(req.prefix, "reports/");
/// assert!(req.continuation_token.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ListRequest {
    /// The bucket to list.
    #[builder(setter(into))]
    pub bucket: String,
    /// Only keys starting with this prefix are returned.
    #[builder(default, setter(into))]
    pub prefix: String,
    /// Keys sharing the segment up to this delimiter are grouped into a
    /// common prefix. Empty disables grouping.
    #[builder(default, setter(into))]
    pub delimiter: String,
    /// Token from the previous page's [`ListPage::next_continuation_token`].
    #[builder(default)]
    pub continuation_token: Option<String>,
    /// Maximum number of entries per page; the store default when unset.
    #[builder(default)]
    pub max_keys: Option<i32>,
}

/// One page of a `ListObjectsV2` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Grouped key prefixes, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    /// Objects directly under the requested prefix.
    pub contents: Vec<ObjectMeta>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Token to request the next page with.
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    /// Whether the listing should continue with another request.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.is_truncated && self.next_continuation_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_name_operations_after_s3_api() {
        assert_eq!(StoreOperation::ListObjects.to_string(), "ListObjects");
        assert_eq!(
            StoreOperation::CompleteMultipartUpload.as_str(),
            "CompleteMultipartUpload"
        );
    }

    #[test]
    fn test_should_stop_paging_without_token() {
        let page = ListPage {
            is_truncated: true,
            next_continuation_token: None,
            ..ListPage::default()
        };
        assert!(!page.has_more());

        let page = ListPage {
            is_truncated: true,
            next_continuation_token: Some("dG9rZW4=".to_owned()),
            ..ListPage::default()
        };
        assert!(page.has_more());
    }

    #[tokio::test]
    async fn test_should_collect_chunked_body() {
        let chunks = vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))];
        let out = GetObjectOutput {
            meta: ObjectMeta {
                key: "k".to_owned(),
                size: 4,
                last_modified: None,
                etag: None,
            },
            body: Box::pin(futures::stream::iter(chunks)),
        };
        assert_eq!(out.collect().await.unwrap().as_ref(), b"abcd");
    }
}
