//! S3 sink implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectSink trait from is3-core.
//! This is the only crate that talks to the AWS SDK; retry and timeout
//! policy belong to the SDK, not to the engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use tokio::io::AsyncReadExt;

use is3_core::{
    ByteStream, Error, IntegrityToken, ObjectSink, ProgressFn, Result, S3Config, S3Location,
    TokenAlgorithm, UploadSummary,
};

use crate::multipart::MultipartConfig;

/// S3 client wrapper
pub struct S3Sink {
    inner: aws_sdk_s3::Client,
    multipart: MultipartConfig,
}

impl S3Sink {
    /// Create a new S3 sink from resolved connection settings
    pub async fn new(config: S3Config) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None, // session token
            None, // expiry
            "is3-static-credentials",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        // Path-style addressing for compatibility with non-AWS endpoints
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            multipart: MultipartConfig::default(),
        }
    }

    /// Override the multipart sizing configuration
    pub fn with_multipart(mut self, multipart: MultipartConfig) -> Self {
        self.multipart = multipart;
        self
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    async fn upload_single(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        mut body: ByteStream,
        progress: ProgressFn<'_>,
    ) -> Result<UploadSummary> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let bytes = data.len() as u64;

        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data));
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request.send().await.map_err(map_sdk_error)?;
        progress(bytes);

        Ok(UploadSummary { bytes, parts: 1 })
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        mut body: ByteStream,
        size: u64,
        progress: ProgressFn<'_>,
    ) -> Result<UploadSummary> {
        let part_size = self.multipart.calculate_part_size(size) as usize;

        let mut request = self.inner.create_multipart_upload().bucket(bucket).key(key);
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        let created = request.send().await.map_err(map_sdk_error)?;
        let upload_id = created.upload_id().unwrap_or_default().to_string();

        let streamed = self
            .stream_parts(bucket, key, &upload_id, part_size, &mut body, progress)
            .await;

        match streamed {
            Ok(summary) => Ok(summary),
            Err(err) => {
                // Leave nothing at the key: an interrupted upload must not
                // read as a truncated success
                let abort = self
                    .inner
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort_err) = abort {
                    tracing::warn!("couldn't abort multipart upload {upload_id}: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn stream_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_size: usize,
        body: &mut ByteStream,
        progress: ProgressFn<'_>,
    ) -> Result<UploadSummary> {
        let mut completed = Vec::new();
        let mut sent: u64 = 0;
        let mut part_number: i32 = 1;

        loop {
            let chunk = read_chunk(body, part_size).await?;
            if chunk.is_empty() && part_number > 1 {
                break;
            }
            let last = chunk.len() < part_size;
            sent += chunk.len() as u64;

            let part = self
                .inner
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(aws_sdk_s3::primitives::ByteStream::from(chunk))
                .send()
                .await
                .map_err(map_sdk_error)?;

            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(part.e_tag().map(str::to_string))
                    .build(),
            );
            progress(sent);

            part_number += 1;
            if last {
                break;
            }
        }

        let parts = completed.len();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(UploadSummary { bytes: sent, parts })
    }
}

#[async_trait]
impl ObjectSink for S3Sink {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(map_sdk_error(err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn exists(&self, dest: &S3Location) -> Result<bool> {
        let request = self
            .inner
            .head_object()
            .bucket(dest.bucket())
            .key(dest.key().unwrap_or_default());

        match request.send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(map_sdk_error(err))
                }
            }
        }
    }

    async fn delete(&self, dest: &S3Location) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(dest.bucket())
            .key(dest.key().unwrap_or_default())
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn upload(
        &self,
        dest: &S3Location,
        body: ByteStream,
        size: u64,
        progress: ProgressFn<'_>,
    ) -> Result<UploadSummary> {
        let bucket = dest.bucket();
        let key = dest.key().unwrap_or_default();
        let content_type = mime_guess::from_path(key)
            .first()
            .map(|m| m.essence_str().to_string());

        if self.multipart.is_multipart(size) {
            self.upload_parts(bucket, key, content_type, body, size, progress)
                .await
        } else {
            self.upload_single(bucket, key, content_type, body, progress)
                .await
        }
    }

    async fn put_attributes(
        &self,
        dest: &S3Location,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        let bucket = dest.bucket();
        let key = dest.key().unwrap_or_default();

        // S3 metadata is write-once with the object; a self-copy with the
        // REPLACE directive is how it changes afterwards
        let mut request = self
            .inner
            .copy_object()
            .copy_source(format!("{bucket}/{key}"))
            .bucket(bucket)
            .key(key)
            .metadata_directive(MetadataDirective::Replace);

        for (attribute, value) in attributes {
            request = request.metadata(attribute, value);
        }

        request.send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    async fn integrity_token(&self, dest: &S3Location) -> Result<Option<IntegrityToken>> {
        let request = self
            .inner
            .head_object()
            .bucket(dest.bucket())
            .key(dest.key().unwrap_or_default());

        match request.send().await {
            Ok(head) => Ok(head.e_tag().and_then(etag_to_token)),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(map_sdk_error(err))
                }
            }
        }
    }
}

/// Classify an SDK error by its message
fn map_sdk_error(err: impl std::fmt::Display) -> Error {
    let message = err.to_string();
    if message.contains("AccessDenied")
        || message.contains("InvalidAccessKeyId")
        || message.contains("SignatureDoesNotMatch")
    {
        Error::Auth(message)
    } else {
        Error::Network(message)
    }
}

/// Decode an ETag into an integrity token
///
/// A plain 32-hex ETag is the MD5 of the content; a `hash-N` ETag comes from
/// a multipart upload and its hash is an MD5-of-part-MD5s, tagged so it is
/// never compared against a whole-content digest.
fn etag_to_token(e_tag: &str) -> Option<IntegrityToken> {
    let e_tag = e_tag.trim_matches('"');

    match e_tag.split_once('-') {
        Some((digest, _part_count)) => hex::decode(digest).ok().map(|bytes| IntegrityToken {
            algorithm: TokenAlgorithm::MultipartMd5,
            bytes,
        }),
        None => hex::decode(e_tag).ok().map(|bytes| IntegrityToken {
            algorithm: TokenAlgorithm::Md5,
            bytes,
        }),
    }
}

/// Read up to `limit` bytes, short only at end of stream
async fn read_chunk(body: &mut ByteStream, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut chunk = vec![0u8; limit];
    let mut filled = 0;

    while filled < limit {
        let n = body.read(&mut chunk[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    chunk.truncate(filled);
    Ok(chunk)
}
