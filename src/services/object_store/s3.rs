//! S3-compatible object store (AWS S3, DigitalOcean Spaces, MinIO).

use super::{ObjectBody, ObjectStore, StoreError, StoreResult};
use crate::{config::S3Config, models::object::ObjectSummary};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, retry::RetryConfig};
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::SdkError,
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;

/// Page size used when following list continuation tokens.
const LIST_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client for `config`.
    ///
    /// Static credentials are used when both key and secret are configured,
    /// otherwise the default AWS provider chain applies. SDK retries are
    /// disabled; a failed call surfaces immediately.
    pub async fn new(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key), Some(secret)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                key,
                secret,
                None,
                None,
                "song-store",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self::from_client(Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<String> {
        let size = data.len();
        let start = Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::Private)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 put failed"
                );
                StoreError::WriteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if matches!(err.err(), HeadObjectError::NotFound(_)) => {
                Ok(false)
            }
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(err) if matches!(err.err(), GetObjectError::NoSuchKey(_)) => {
                    StoreError::ObjectNotFound(key.to_string())
                }
                _ => {
                    tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 get failed");
                    StoreError::Backend(e.to_string())
                }
            })?;

        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let stream = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(ObjectBody {
            content_length,
            stream,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let start = Instant::now();

        // S3 answers DeleteObject with success for absent keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StoreError::Backend(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn list(&self, max_keys: usize) -> StoreResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        while objects.len() < max_keys {
            let page = (max_keys - objects.len()).min(LIST_PAGE_SIZE);
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .max_keys(page as i32)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            for obj in output.contents() {
                let Some(key) = obj.key() else { continue };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    size: obj.size().unwrap_or_default(),
                    last_modified: obj.last_modified().and_then(|t| {
                        DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        objects.truncate(max_keys);
        Ok(objects)
    }
}
