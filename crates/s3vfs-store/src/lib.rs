//! Object store boundary for s3vfs.
//!
//! The filesystem layer in `s3vfs-core` never talks to S3 directly. It drives
//! the [`ObjectStore`] trait defined here, which models the handful of
//! S3 RPCs a flat, key-addressed store needs to emulate a filesystem:
//! get/head/put, ListObjectsV2 with a delimiter, copy, delete and the
//! multipart upload family.
//!
//! # Backends
//!
//! ```text
//!           ObjectStore (trait)
//!                  |
//!     +------------+-------------+
//!     |            |             |
//! AwsS3Store   MemoryStore   decorators
//! (aws-sdk-s3) (in-process)  TimeoutStore / FailingStore
//! ```
//!
//! [`AwsS3Store`] is the production backend. [`MemoryStore`] keeps buckets in
//! process memory and implements the same listing and multipart semantics,
//! which makes it suitable for tests and local tooling. The decorators wrap
//! any other store: [`TimeoutStore`] puts a deadline on every call and
//! [`FailingStore`] injects failures into chosen operations.

pub mod aws;
pub mod error;
pub mod failing;
pub mod memory;
pub mod model;
pub mod store;
pub mod timeout;

pub use aws::AwsS3Store;
pub use error::{StoreError, StoreResult};
pub use failing::{FailingStore, FailurePolicy};
pub use memory::MemoryStore;
pub use model::{
    ByteStream, CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta, StoreOperation,
};
pub use store::ObjectStore;
pub use timeout::TimeoutStore;
