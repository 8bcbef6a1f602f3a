//! In-memory object store.
//!
//! [`MemoryStore`] keeps every bucket in a sorted map behind a read-write
//! lock, and in-progress multipart uploads in a [`DashMap`] keyed by upload
//! ID. It implements the S3 semantics the filesystem layer depends on:
//!
//! - `ListObjectsV2` with prefix, delimiter grouping, `max-keys` paging and
//!   opaque (base64) continuation tokens; common prefixes count towards the
//!   page size and are never repeated across pages;
//! - idempotent deletes;
//! - multipart uploads assembled in part-number order, with composite ETags
//!   (`"<md5-of-md5s>-<count>"`).
//!
//! Object bodies are handed out as a stream of fixed-size chunks so that
//! readers exercise the same incremental path as with a network body.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta};
use crate::store::ObjectStore;

/// Default (and maximum) number of entries in a single listing page.
const DEFAULT_MAX_KEYS: usize = 1000;

/// Default size of the chunks a body is streamed in (64 KiB).
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Highest part number S3 accepts.
const MAX_PART_NUMBER: i32 = 10_000;

// ---------------------------------------------------------------------------
// Stored data
// ---------------------------------------------------------------------------

/// An object body together with the metadata S3 reports for it.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes) -> Self {
        let etag = compute_etag(&data);
        Self {
            data,
            etag,
            last_modified: Utc::now(),
        }
    }

    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_owned(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            etag: Some(self.etag.clone()),
        }
    }
}

/// An open multipart upload and the parts received so far.
#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, StoredObject>,
}

impl PendingUpload {
    fn belongs_to(&self, bucket: &str, key: &str) -> bool {
        self.bucket == bucket && self.key == key
    }
}

type Bucket = BTreeMap<String, StoredObject>;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe in-process implementation of [`ObjectStore`].
///
/// Buckets must be created with [`MemoryStore::create_bucket`] before use;
/// every operation against an unknown bucket fails with
/// [`StoreError::NoSuchBucket`].
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use s3vfs_store::{ListRequest, MemoryStore, ObjectStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.create_bucket("photos");
/// store.put_object("photos", "2024/jan/a.jpg", Bytes::from("a")).await.unwrap();
/// store.put_object("photos", "2024/feb/b.jpg", Bytes::from("b")).await.unwrap();
///
/// let req = ListRequest::builder().bucket("photos").prefix("2024/").delimiter("/").build();
/// let page = store.list_objects(&req).await.unwrap();
/// assert_eq!(page.common_prefixes, vec!["2024/feb/", "2024/jan/"]);
/// # });
/// ```
pub struct MemoryStore {
    /// Objects per bucket, sorted by key.
    buckets: RwLock<HashMap<String, Bucket>>,
    /// In-progress multipart uploads keyed by upload ID.
    uploads: DashMap<String, PendingUpload>,
    /// Size of the chunks object bodies are streamed in.
    chunk_size: usize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("buckets", &self.buckets.read().len())
            .field("uploads", &self.uploads.len())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create an empty store that streams bodies in `chunk_size` pieces.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        debug!(chunk_size, "creating MemoryStore");
        Self {
            buckets: RwLock::new(HashMap::new()),
            uploads: DashMap::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Create a bucket. Creating an existing bucket keeps its contents.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.write().entry(bucket.to_owned()).or_default();
    }

    /// Whether an object exists under `key`.
    #[must_use]
    pub fn contains_key(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .get(bucket)
            .is_some_and(|b| b.contains_key(key))
    }

    /// All keys of a bucket in lexicographic order.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of multipart uploads that were created but neither completed
    /// nor aborted.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    fn with_bucket<T>(&self, bucket: &str, f: impl FnOnce(&Bucket) -> T) -> StoreResult<T> {
        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(f(objects))
    }

    fn with_bucket_mut<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut Bucket) -> T,
    ) -> StoreResult<T> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        Ok(f(objects))
    }

    fn stored(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        self.with_bucket(bucket, |objects| objects.get(key).cloned())?
            .ok_or_else(|| StoreError::NoSuchKey {
                key: key.to_owned(),
            })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let object = self.stored(bucket, key)?;
        let meta = object.meta(key);
        let chunks: Vec<StoreResult<Bytes>> = object
            .data
            .chunks(self.chunk_size)
            .map(|chunk| Ok(object.data.slice_ref(chunk)))
            .collect();

        trace!(bucket, key, size = meta.size, chunks = chunks.len(), "get_object");
        Ok(GetObjectOutput {
            meta,
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        Ok(self.stored(bucket, key)?.meta(key))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<String> {
        let size = body.len();
        let object = StoredObject::new(body);
        let etag = object.etag.clone();
        self.with_bucket_mut(bucket, |objects| objects.insert(key.to_owned(), object))?;

        trace!(bucket, key, size, "stored object");
        Ok(etag)
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        let start_after = match request.continuation_token.as_deref() {
            Some(token) => decode_continuation_token(token)?,
            None => String::new(),
        };
        let max_keys = request.max_keys.map_or(DEFAULT_MAX_KEYS, |n| {
            usize::try_from(n).unwrap_or(1).clamp(1, DEFAULT_MAX_KEYS)
        });

        let listing = self.with_bucket(&request.bucket, |objects| {
            list_from_btree(
                objects.iter(),
                &request.prefix,
                &request.delimiter,
                &start_after,
                max_keys,
            )
        })?;

        debug!(
            bucket = %request.bucket,
            prefix = %request.prefix,
            objects = listing.objects.len(),
            common_prefixes = listing.common_prefixes.len(),
            is_truncated = listing.is_truncated,
            "list_objects completed"
        );

        Ok(ListPage {
            common_prefixes: listing.common_prefixes,
            contents: listing.objects,
            is_truncated: listing.is_truncated,
            next_continuation_token: listing
                .next_marker
                .as_deref()
                .map(encode_continuation_token),
        })
    }

    async fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.with_bucket_mut(bucket, |objects| -> StoreResult<()> {
            let source = objects
                .get(src_key)
                .ok_or_else(|| StoreError::NoSuchKey {
                    key: src_key.to_owned(),
                })?;
            let copy = StoredObject {
                data: source.data.clone(),
                etag: source.etag.clone(),
                last_modified: Utc::now(),
            };
            objects.insert(dst_key.to_owned(), copy);
            Ok(())
        })??;

        debug!(bucket, src_key, dst_key, "copied object");
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let existed = self.with_bucket_mut(bucket, |objects| objects.remove(key).is_some())?;
        trace!(bucket, key, existed, "deleted object");
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String> {
        self.with_bucket(bucket, |_| ())?;
        let upload_id = Uuid::new_v4().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                parts: BTreeMap::new(),
            },
        );

        debug!(bucket, key, upload_id = %upload_id, "created multipart upload");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(StoreError::InvalidArgument {
                message: format!("part number must be between 1 and {MAX_PART_NUMBER}"),
            });
        }

        let mut upload = self
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.belongs_to(bucket, key))
            .ok_or_else(|| no_such_upload(upload_id))?;

        let size = body.len();
        let part = StoredObject::new(body);
        let etag = part.etag.clone();
        upload.parts.insert(part_number, part);

        trace!(bucket, key, upload_id, part_number, size, "stored part");
        Ok(CompletedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        let assembled = {
            let upload = self
                .uploads
                .get(upload_id)
                .filter(|u| u.belongs_to(bucket, key))
                .ok_or_else(|| no_such_upload(upload_id))?;
            assemble_parts(&upload, parts)?
        };

        let size = assembled.data.len();
        self.with_bucket_mut(bucket, |objects| objects.insert(key.to_owned(), assembled))?;
        self.uploads.remove(upload_id);

        debug!(
            bucket,
            key,
            upload_id,
            size,
            parts = parts.len(),
            "completed multipart upload"
        );
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.uploads
            .remove_if(upload_id, |_, u| u.belongs_to(bucket, key))
            .ok_or_else(|| no_such_upload(upload_id))?;

        debug!(bucket, key, upload_id, "aborted multipart upload");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Multipart assembly
// ---------------------------------------------------------------------------

/// Concatenate the requested parts of `upload` in order.
fn assemble_parts(upload: &PendingUpload, parts: &[CompletedPart]) -> StoreResult<StoredObject> {
    if parts.is_empty() {
        return Err(StoreError::InvalidArgument {
            message: "a multipart upload must be completed with at least one part".to_owned(),
        });
    }
    if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
        return Err(StoreError::InvalidArgument {
            message: "the list of parts was not in ascending order".to_owned(),
        });
    }

    let mut combined = BytesMut::new();
    let mut digests = Vec::with_capacity(parts.len() * 16);
    for requested in parts {
        let stored = upload
            .parts
            .get(&requested.part_number)
            .filter(|p| p.etag == requested.etag)
            .ok_or(StoreError::InvalidPart)?;
        digests.extend_from_slice(&Md5::digest(&stored.data));
        combined.extend_from_slice(&stored.data);
    }

    let etag = format!("\"{}-{}\"", hex::encode(Md5::digest(&digests)), parts.len());
    Ok(StoredObject {
        data: combined.freeze(),
        etag,
        last_modified: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One page of listing results before it is turned into a [`ListPage`].
#[derive(Debug, Default)]
struct Listing {
    objects: Vec<ObjectMeta>,
    common_prefixes: Vec<String>,
    is_truncated: bool,
    /// The last entry (key or common prefix) returned on this page.
    next_marker: Option<String>,
}

/// Build a page from sorted `(key, object)` pairs, applying prefix,
/// delimiter, start-after and max-keys filtering.
///
/// A `start_after` marker that is itself a common prefix resumes after the
/// whole group, so a prefix never appears on two pages.
fn list_from_btree<'a>(
    objects: impl Iterator<Item = (&'a String, &'a StoredObject)>,
    prefix: &str,
    delimiter: &str,
    start_after: &str,
    max_keys: usize,
) -> Listing {
    let use_delim = !delimiter.is_empty();
    let resume_after_group = use_delim
        && start_after
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.contains(delimiter));

    let mut listing = Listing::default();
    let mut seen_prefixes = HashSet::new();
    let mut count = 0usize;

    for (key, object) in objects {
        if !start_after.is_empty() {
            if key.as_str() <= start_after
                || (resume_after_group && key.starts_with(start_after))
            {
                continue;
            }
        }

        let Some(after_prefix) = key.strip_prefix(prefix) else {
            continue;
        };

        let common_prefix = if use_delim {
            after_prefix
                .find(delimiter)
                .map(|pos| format!("{prefix}{}{delimiter}", &after_prefix[..pos]))
        } else {
            None
        };

        if common_prefix
            .as_ref()
            .is_some_and(|cp| seen_prefixes.contains(cp))
        {
            continue;
        }

        if count >= max_keys {
            listing.is_truncated = true;
            break;
        }
        count += 1;

        match common_prefix {
            Some(cp) => {
                seen_prefixes.insert(cp.clone());
                listing.common_prefixes.push(cp.clone());
                listing.next_marker = Some(cp);
            }
            None => {
                listing.objects.push(object.meta(key));
                listing.next_marker = Some(key.clone());
            }
        }
    }

    if !listing.is_truncated {
        listing.next_marker = None;
    }
    listing
}

/// Encode a marker as an opaque continuation token.
fn encode_continuation_token(marker: &str) -> String {
    BASE64_STANDARD.encode(marker.as_bytes())
}

/// Decode a continuation token produced by [`encode_continuation_token`].
fn decode_continuation_token(token: &str) -> StoreResult<String> {
    let bytes = BASE64_STANDARD
        .decode(token)
        .map_err(|_| StoreError::InvalidArgument {
            message: "Invalid continuation token".to_owned(),
        })?;
    String::from_utf8(bytes).map_err(|_| StoreError::InvalidArgument {
        message: "Continuation token contains invalid UTF-8".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Quoted hex MD5 of `data`, the ETag of a single-part object.
fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

fn no_such_bucket(bucket: &str) -> StoreError {
    StoreError::NoSuchBucket {
        bucket: bucket.to_owned(),
    }
}

fn no_such_upload(upload_id: &str) -> StoreError {
    StoreError::NoSuchUpload {
        upload_id: upload_id.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
