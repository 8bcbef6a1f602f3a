//! The [`S3Fs`] filesystem.
//!
//! `S3Fs` maps paths onto object keys under a root prefix and turns each
//! filesystem call into one or a few store calls:
//!
//! ```text
//! open / create   -> file handle (GetObject | PutObject | multipart)
//! stat            -> HeadObject, ListObjectsV2 fallback for directories
//! rename          -> CopyObject, then DeleteObject
//! remove          -> DeleteObject
//! read_dir        -> ListObjectsV2 pages (delimiter = separator)
//! mkdir_all       -> nothing, or a zero-byte marker object
//! ```
//!
//! Nothing is cached: every call observes the store as it is.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use s3vfs_store::{ListRequest, ObjectStore, StoreOperation, TimeoutStore};
use tracing::{debug, info, warn};

use crate::config::{FsConfig, ReadStrategy};
use crate::error::{FsError, FsResult};
use crate::file::{
    BufferedReadFile, BufferedWriteFile, File, MultipartWriteFile, StreamingReadFile,
};
use crate::flags::{Capabilities, O_RDONLY, O_WRONLY, OpenMode};
use crate::info::ObjectInfo;
use crate::lister::DirectoryLister;
use crate::path;
use crate::vfs::{Basic, Capable, Chroot, Dir, Symlink, TempFile};

/// Permissions `create` and `open` pass to `open_file`.
const DEFAULT_PERM: u32 = 0o666;

/// A POSIX-like filesystem over one bucket of an object store.
///
/// Cloning is cheap; clones and chrooted views share the same store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use s3vfs_core::{FsConfig, S3Fs};
/// use s3vfs_core::vfs::{Basic, Chroot, Dir};
/// use s3vfs_store::MemoryStore;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// store.create_bucket("media");
///
/// let config = FsConfig::builder().bucket("media".into()).build();
/// let fs = S3Fs::new(store, config).unwrap();
///
/// let mut file = fs.create("photos/cat.jpg").await.unwrap();
/// file.write(b"meow").await.unwrap();
/// file.close().await.unwrap();
///
/// let photos = fs.chroot("photos").unwrap();
/// let entries = photos.read_dir("").await.unwrap();
/// assert_eq!(entries[0].name, "photos/cat.jpg");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct S3Fs {
    store: Arc<dyn ObjectStore>,
    config: Arc<FsConfig>,
    root: String,
}

impl S3Fs {
    /// Create a filesystem over `store` with `config`.
    ///
    /// Fails with [`FsError::Config`] if the bucket or separator is empty.
    /// When a per-call timeout is configured, `store` is wrapped so that
    /// every call carries it.
    pub fn new(store: Arc<dyn ObjectStore>, config: FsConfig) -> FsResult<Self> {
        config.validate()?;

        let store = match config.operation_timeout() {
            Some(timeout) => Arc::new(TimeoutStore::new(store, timeout)) as Arc<dyn ObjectStore>,
            None => store,
        };
        let root = path::resolve("", &config.separator, &config.root);

        info!(
            bucket = %config.bucket,
            root = %root,
            separator = %config.separator,
            read_strategy = %config.read_strategy,
            timeout_ms = ?config.operation_timeout_ms,
            "s3vfs filesystem ready"
        );
        Ok(Self {
            store,
            config: Arc::new(config),
            root,
        })
    }

    /// The bucket holding this filesystem.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// The path separator.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.config.separator
    }

    /// The configuration this filesystem was created with.
    ///
    /// `root` there is the original root; chrooted views report theirs
    /// through [`Chroot::root`].
    #[must_use]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The store every call goes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// The object key `path` addresses.
    #[must_use]
    pub fn key(&self, path: &str) -> String {
        path::resolve(&self.root, self.separator(), path)
    }

    fn lister(&self) -> DirectoryLister {
        DirectoryLister::new(
            Arc::clone(&self.store),
            self.config.bucket.clone(),
            self.config.separator.clone(),
        )
        .with_page_size(self.config.list_page_size)
    }

    /// Whether any key lives below `key` treated as a directory.
    async fn is_dir(&self, key: &str) -> FsResult<bool> {
        let prefix = path::dir_prefix(key, self.separator());
        let request = ListRequest::builder()
            .bucket(self.bucket())
            .prefix(prefix.as_str())
            .delimiter(self.separator())
            .max_keys(Some(1))
            .build();
        let page = self
            .store
            .list_objects(&request)
            .await
            .map_err(|e| FsError::from_store(StoreOperation::ListObjects, prefix.as_str(), e))?;
        Ok(!page.common_prefixes.is_empty() || !page.contents.is_empty())
    }
}

#[async_trait]
impl Basic for S3Fs {
    async fn create(&self, path: &str) -> FsResult<Box<dyn File>> {
        self.open_file(path, O_WRONLY, DEFAULT_PERM).await
    }

    async fn open(&self, path: &str) -> FsResult<Box<dyn File>> {
        self.open_file(path, O_RDONLY, DEFAULT_PERM).await
    }

    async fn open_file(&self, path: &str, flag: i32, _perm: u32) -> FsResult<Box<dyn File>> {
        let mode = OpenMode::from_flag(flag)?;
        let key = self.key(path);
        let store = Arc::clone(&self.store);
        let bucket = self.config.bucket.clone();
        debug!(bucket = %bucket, key = %key, ?mode, "open file");

        let file: Box<dyn File> = match mode {
            OpenMode::Read => match self.config.read_strategy {
                ReadStrategy::Streaming => {
                    Box::new(StreamingReadFile::open(store, bucket, key).await?)
                }
                ReadStrategy::Buffered => {
                    Box::new(BufferedReadFile::open(store, bucket, key).await?)
                }
            },
            OpenMode::Write => Box::new(BufferedWriteFile::new(store, bucket, key)),
            OpenMode::MultipartWrite => Box::new(
                MultipartWriteFile::create(
                    store,
                    bucket,
                    key,
                    self.config.abort_on_close_failure,
                )
                .await?,
            ),
        };
        Ok(file)
    }

    async fn stat(&self, path: &str) -> FsResult<ObjectInfo> {
        let key = self.key(path);
        if key.is_empty() {
            return Ok(ObjectInfo::directory(""));
        }

        match self.store.head_object(self.bucket(), &key).await {
            Ok(meta) => Ok(ObjectInfo::file(meta)),
            Err(e) if e.is_not_found() => {
                if self.is_dir(&key).await? {
                    Ok(ObjectInfo::directory(path::dir_prefix(&key, self.separator())))
                } else {
                    Err(FsError::NotFound { path: key })
                }
            }
            Err(e) => Err(FsError::from_store(StoreOperation::HeadObject, key, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let src = self.key(from);
        let dst = self.key(to);
        if src == dst {
            return Ok(());
        }

        self.store
            .copy_object(self.bucket(), &src, &dst)
            .await
            .map_err(|e| FsError::from_store(StoreOperation::CopyObject, src.as_str(), e))?;

        if let Err(e) = self.store.delete_object(self.bucket(), &src).await {
            warn!(
                src = %src,
                dst = %dst,
                error = %e,
                "rename copied but could not delete the source",
            );
            return Err(FsError::from_store(StoreOperation::DeleteObject, src, e));
        }

        debug!(bucket = %self.bucket(), src = %src, dst = %dst, "renamed");
        Ok(())
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let key = self.key(path);
        self.store
            .delete_object(self.bucket(), &key)
            .await
            .map_err(|e| FsError::from_store(StoreOperation::DeleteObject, key.as_str(), e))?;
        debug!(bucket = %self.bucket(), key = %key, "removed");
        Ok(())
    }

    fn join(&self, elements: &[&str]) -> String {
        path::join(elements, self.separator())
    }
}

#[async_trait]
impl Dir for S3Fs {
    async fn read_dir(&self, path: &str) -> FsResult<Vec<ObjectInfo>> {
        let prefix = path::dir_prefix(&self.key(path), self.separator());
        self.lister().list(&prefix).await
    }

    async fn mkdir_all(&self, path: &str, _perm: u32) -> FsResult<()> {
        let key = self.key(path);
        if !self.config.directory_markers || key.is_empty() {
            return Ok(());
        }

        let marker = path::dir_prefix(&key, self.separator());
        self.store
            .put_object(self.bucket(), &marker, Bytes::new())
            .await
            .map_err(|e| FsError::from_store(StoreOperation::PutObject, marker.as_str(), e))?;
        debug!(bucket = %self.bucket(), marker = %marker, "created directory marker");
        Ok(())
    }
}

impl Chroot for S3Fs {
    fn chroot(&self, path: &str) -> FsResult<Self> {
        let root = self.key(path);
        debug!(from = %self.root, to = %root, "chroot");
        Ok(Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            root,
        })
    }

    fn root(&self) -> &str {
        &self.root
    }
}

#[async_trait]
impl Symlink for S3Fs {
    async fn lstat(&self, _path: &str) -> FsResult<ObjectInfo> {
        Err(FsError::Unsupported { operation: "lstat" })
    }

    async fn symlink(&self, _target: &str, _link: &str) -> FsResult<()> {
        Err(FsError::Unsupported {
            operation: "symlink",
        })
    }

    async fn readlink(&self, _link: &str) -> FsResult<String> {
        Err(FsError::Unsupported {
            operation: "readlink",
        })
    }
}

#[async_trait]
impl TempFile for S3Fs {
    async fn temp_file(&self, _dir: &str, _prefix: &str) -> FsResult<Box<dyn File>> {
        Err(FsError::Unsupported {
            operation: "temp_file",
        })
    }
}

impl Capable for S3Fs {
    fn capabilities(&self) -> Capabilities {
        match self.config.read_strategy {
            ReadStrategy::Streaming => Capabilities::READ | Capabilities::WRITE,
            ReadStrategy::Buffered => {
                Capabilities::READ | Capabilities::WRITE | Capabilities::SEEK
            }
        }
    }
}
