//! Directory listing over `ListObjectsV2`.
//!
//! A directory is the set of keys sharing a prefix. Listing it with the
//! separator as delimiter yields the direct children: objects become file
//! entries and common prefixes become directory entries. The lister walks
//! every page of the listing before returning.

use std::sync::Arc;

use s3vfs_store::{ListRequest, ObjectStore, StoreOperation};
use tracing::{debug, trace};

use crate::error::{FsError, FsResult};
use crate::info::ObjectInfo;

/// Lists the direct children of a key prefix.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    separator: String,
    page_size: Option<i32>,
}

impl DirectoryLister {
    /// A lister for `bucket` using `separator` as the delimiter.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, separator: String) -> Self {
        Self {
            store,
            bucket,
            separator,
            page_size: None,
        }
    }

    /// Request pages of at most `page_size` entries; the store default when `None`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: Option<i32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// List every entry directly under `prefix`.
    ///
    /// Directories come first, then files, each group in store order. An
    /// object whose key equals `prefix` (a directory marker) is not an entry
    /// of its own directory and is skipped. The first failing page fails the
    /// whole call; no partial result is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use bytes::Bytes;
    /// use s3vfs_core::DirectoryLister;
    /// use s3vfs_store::{MemoryStore, ObjectStore};
    ///
    /// # tokio_test::block_on(async {
    /// let store = Arc::new(MemoryStore::new());
    /// store.create_bucket("b");
    /// for key in ["a/1", "a/2", "a/b/3"] {
    ///     store.put_object("b", key, Bytes::new()).await.unwrap();
    /// }
    ///
    /// let lister = DirectoryLister::new(store, "b".into(), "/".into());
    /// let names: Vec<_> = lister
    ///     .list("a/")
    ///     .await
    ///     .unwrap()
    ///     .into_iter()
    ///     .map(|e| e.name)
    ///     .collect();
    /// assert_eq!(names, ["a/b/", "a/1", "a/2"]);
    /// # });
    /// ```
    pub async fn list(&self, prefix: &str) -> FsResult<Vec<ObjectInfo>> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request = ListRequest::builder()
                .bucket(self.bucket.as_str())
                .prefix(prefix)
                .delimiter(self.separator.as_str())
                .continuation_token(token.take())
                .max_keys(self.page_size)
                .build();

            let page = self
                .store
                .list_objects(&request)
                .await
                .map_err(|e| FsError::from_store(StoreOperation::ListObjects, prefix, e))?;
            pages += 1;
            trace!(
                prefix,
                page = pages,
                prefixes = page.common_prefixes.len(),
                objects = page.contents.len(),
                "listed page"
            );

            let more = page.has_more();
            dirs.extend(page.common_prefixes.into_iter().map(ObjectInfo::directory));
            files.extend(
                page.contents
                    .into_iter()
                    .filter(|meta| meta.key != prefix)
                    .map(ObjectInfo::file),
            );

            if !more {
                break;
            }
            token = page.next_continuation_token;
        }

        debug!(
            bucket = %self.bucket,
            prefix,
            dirs = dirs.len(),
            files = files.len(),
            pages,
            "listed directory",
        );
        dirs.append(&mut files);
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use s3vfs_store::{FailingStore, FailurePolicy, MemoryStore};

    use super::*;

    async fn populated(keys: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("b");
        for key in keys {
            store
                .put_object("b", key, Bytes::from(key.to_string()))
                .await
                .unwrap();
        }
        store
    }

    fn names(entries: &[ObjectInfo]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_should_merge_directories_then_files() {
        let store = populated(&["a/1", "a/2", "a/b/3"]).await;
        let lister = DirectoryLister::new(store, "b".into(), "/".into());

        let entries = lister.list("a/").await.unwrap();
        assert_eq!(names(&entries), ["a/b/", "a/1", "a/2"]);
        assert!(entries[0].is_dir());
        assert_eq!(entries[0].size, 0);
        assert!(!entries[1].is_dir());
        assert_eq!(entries[1].size, 3);
        assert!(entries[1].modified.is_some());
    }

    #[tokio::test]
    async fn test_should_list_bucket_root() {
        let store = populated(&["top.txt", "x/1", "y/z/2"]).await;
        let lister = DirectoryLister::new(store, "b".into(), "/".into());
        let entries = lister.list("").await.unwrap();
        assert_eq!(names(&entries), ["x/", "y/", "top.txt"]);
    }

    #[tokio::test]
    async fn test_should_walk_every_page() {
        let keys: Vec<String> = (0..7)
            .map(|i| format!("d/f{i}"))
            .chain((0..5).map(|i| format!("d/s{i}/x")))
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = populated(&refs).await;

        let lister = DirectoryLister::new(store, "b".into(), "/".into()).with_page_size(Some(2));
        let entries = lister.list("d/").await.unwrap();

        let dirs: Vec<_> = entries.iter().filter(|e| e.is_dir()).collect();
        let files: Vec<_> = entries.iter().filter(|e| !e.is_dir()).collect();
        assert_eq!(dirs.len(), 5);
        assert_eq!(files.len(), 7);
        assert!(entries[..5].iter().all(ObjectInfo::is_dir));
    }

    #[tokio::test]
    async fn test_should_skip_directory_marker() {
        let store = populated(&["d/", "d/f"]).await;
        let lister = DirectoryLister::new(store, "b".into(), "/".into());
        assert_eq!(names(&lister.list("d/").await.unwrap()), ["d/f"]);
    }

    #[tokio::test]
    async fn test_should_use_custom_separator() {
        let store = populated(&["a:1", "a:b:2"]).await;
        let lister = DirectoryLister::new(store, "b".into(), ":".into());
        assert_eq!(names(&lister.list("a:").await.unwrap()), ["a:b:", "a:1"]);
    }

    #[tokio::test]
    async fn test_should_fail_without_partial_result() {
        let keys: Vec<String> = (0..6).map(|i| format!("f{i}")).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let memory = populated(&refs).await;
        let store = Arc::new(FailingStore::new(
            memory,
            FailurePolicy::AfterCalls {
                operation: StoreOperation::ListObjects,
                count: 1,
            },
        ));

        let lister = DirectoryLister::new(store, "b".into(), "/".into()).with_page_size(Some(2));
        let err = lister.list("").await.unwrap_err();
        assert!(matches!(
            err,
            FsError::Store {
                operation: StoreOperation::ListObjects,
                ..
            }
        ));
    }
}
