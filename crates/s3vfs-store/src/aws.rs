//! [`ObjectStore`] backed by `aws-sdk-s3`.
//!
//! Works against AWS S3 and any S3-compatible endpoint (MinIO, LocalStack,
//! RustFS, ...). Every SDK failure is mapped to a [`StoreError`]: the
//! "object absent" family becomes [`StoreError::NoSuchKey`], everything else
//! is wrapped in [`StoreError::Service`] with the SDK error kept as source.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream as SdkByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as SdkCompletedPart};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CompletedPart, GetObjectOutput, ListPage, ListRequest, ObjectMeta, StoreOperation,
};
use crate::store::ObjectStore;

/// Characters left unescaped in the `x-amz-copy-source` key component.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3 object store using an `aws_sdk_s3::Client`.
///
/// The client is cheap to clone and safe to share; one `AwsS3Store` can back
/// any number of filesystems and open files.
#[derive(Debug, Clone)]
pub struct AwsS3Store {
    client: Client,
}

impl AwsS3Store {
    /// Wrap an already configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential and region chain.
    ///
    /// When `endpoint_url` is set, requests go to that endpoint with
    /// path-style addressing, which is what S3-compatible servers expect.
    pub async fn from_env(endpoint_url: Option<String>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = endpoint_url {
            debug!(endpoint_url = %url, "using custom S3 endpoint");
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()))
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for AwsS3Store {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    no_such_key(key)
                } else {
                    service_error(StoreOperation::GetObject, err)
                }
            })?;

        let meta = ObjectMeta {
            key: key.to_owned(),
            size: non_negative(resp.content_length()),
            last_modified: resp.last_modified().and_then(to_chrono),
            etag: resp.e_tag().map(str::to_owned),
        };
        trace!(bucket, key, size = meta.size, "get_object");

        let body = futures::stream::try_unfold(resp.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(err) => Err(StoreError::service(StoreOperation::GetObject, err)),
            }
        });

        Ok(GetObjectOutput {
            meta,
            body: Box::pin(body),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    no_such_key(key)
                } else {
                    service_error(StoreOperation::HeadObject, err)
                }
            })?;

        Ok(ObjectMeta {
            key: key.to_owned(),
            size: non_negative(resp.content_length()),
            last_modified: resp.last_modified().and_then(to_chrono),
            etag: resp.e_tag().map(str::to_owned),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<String> {
        let size = body.len();
        let resp = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|err| service_error(StoreOperation::PutObject, err))?;

        trace!(bucket, key, size, "put_object");
        Ok(resp.e_tag().unwrap_or_default().to_owned())
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        let delimiter = (!request.delimiter.is_empty()).then(|| request.delimiter.clone());
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(delimiter)
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys)
            .send()
            .await
            .map_err(|err| {
                if error_code(&err) == Some("NoSuchBucket") {
                    StoreError::NoSuchBucket {
                        bucket: request.bucket.clone(),
                    }
                } else {
                    service_error(StoreOperation::ListObjects, err)
                }
            })?;

        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(str::to_owned)
            .collect();
        let contents = resp
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectMeta {
                    key: object.key()?.to_owned(),
                    size: non_negative(object.size()),
                    last_modified: object.last_modified().and_then(to_chrono),
                    etag: object.e_tag().map(str::to_owned),
                })
            })
            .collect();

        Ok(ListPage {
            common_prefixes,
            contents,
            is_truncated: resp.is_truncated().unwrap_or(false),
            next_continuation_token: resp.next_continuation_token().map(str::to_owned),
        })
    }

    async fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source(bucket, src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|err| {
                if error_code(&err) == Some("NoSuchKey") {
                    no_such_key(src_key)
                } else {
                    service_error(StoreOperation::CopyObject, err)
                }
            })?;

        debug!(bucket, src_key, dst_key, "copy_object");
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| service_error(StoreOperation::DeleteObject, err))?;

        trace!(bucket, key, "delete_object");
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| service_error(StoreOperation::CreateMultipartUpload, err))?;

        let upload_id = resp
            .upload_id()
            .ok_or_else(|| StoreError::MalformedResponse {
                operation: StoreOperation::CreateMultipartUpload,
                message: "missing upload ID".to_owned(),
            })?
            .to_owned();

        debug!(bucket, key, upload_id = %upload_id, "create_multipart_upload");
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
        let size = body.len();
        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|err| upload_error(StoreOperation::UploadPart, upload_id, err))?;

        let etag = resp
            .e_tag()
            .ok_or_else(|| StoreError::MalformedResponse {
                operation: StoreOperation::UploadPart,
                message: format!("missing ETag for part {part_number}"),
            })?
            .to_owned();

        trace!(bucket, key, upload_id, part_number, size, "upload_part");
        Ok(CompletedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        SdkCompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|err| {
                if error_code(&err) == Some("InvalidPart") {
                    StoreError::InvalidPart
                } else {
                    upload_error(StoreOperation::CompleteMultipartUpload, upload_id, err)
                }
            })?;

        debug!(
            bucket,
            key,
            upload_id,
            parts = parts.len(),
            "complete_multipart_upload"
        );
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|err| upload_error(StoreOperation::AbortMultipartUpload, upload_id, err))?;

        debug!(bucket, key, upload_id, "abort_multipart_upload");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// The S3 error code of a service error, if the failure got that far.
fn error_code<E, R>(err: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    err.as_service_error().and_then(ProvideErrorMetadata::code)
}

fn service_error<E, R>(operation: StoreOperation, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    StoreError::Service {
        operation,
        message: DisplayErrorContext(&err).to_string(),
        source: Box::new(err),
    }
}

/// Map `NoSuchUpload` for multipart calls, wrap anything else.
fn upload_error<E, R>(operation: StoreOperation, upload_id: &str, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if error_code(&err) == Some("NoSuchUpload") {
        StoreError::NoSuchUpload {
            upload_id: upload_id.to_owned(),
        }
    } else {
        service_error(operation, err)
    }
}

fn no_such_key(key: &str) -> StoreError {
    StoreError::NoSuchKey {
        key: key.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Value of the `x-amz-copy-source` header for `key` in `bucket`.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE_KEY))
}

fn to_chrono(dt: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn non_negative(size: Option<i64>) -> u64 {
    size.and_then(|s| u64::try_from(s).ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_percent_encode_copy_source_key() {
        assert_eq!(copy_source("bucket", "a/b c.txt"), "bucket/a/b%20c.txt");
        assert_eq!(copy_source("bucket", "x+y/ü"), "bucket/x%2By/%C3%BC");
        assert_eq!(copy_source("bucket", "plain-key_1.~"), "bucket/plain-key_1.~");
    }

    #[test]
    fn test_should_convert_sdk_timestamps() {
        let dt = SdkDateTime::from_secs_and_nanos(1_700_000_000, 500);
        let converted = to_chrono(&dt).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(converted.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn test_should_clamp_negative_sizes() {
        assert_eq!(non_negative(Some(42)), 42);
        assert_eq!(non_negative(Some(-1)), 0);
        assert_eq!(non_negative(None), 0);
    }
}
