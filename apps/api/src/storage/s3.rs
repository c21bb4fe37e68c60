use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::{bounded, ObjectStore, StorageError};
use crate::config::Config;

const MAX_ATTEMPTS: u32 = 3;

/// S3-backed object store. Works against AWS or any S3-compatible endpoint (MinIO).
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, timeout: Duration) -> Self {
        Self {
            client,
            bucket,
            timeout,
        }
    }

    /// Constructs a client configured for MinIO (custom endpoint) or AWS.
    /// Transient failures are retried by the SDK's standard retry policy.
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "aipply-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.s3_endpoint {
            info!("Using custom S3 endpoint {endpoint}");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(
            Client::from_conf(builder.build()),
            config.s3_bucket.clone(),
            config.outbound_timeout,
        )
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let size = bytes.len();
        bounded(self.timeout, async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes))
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
            Ok(())
        })
        .await?;

        debug!("Stored {size} bytes at s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        bounded(self.timeout, async {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        StorageError::NotFound(key.to_string())
                    } else {
                        StorageError::Backend(DisplayErrorContext(&e).to_string())
                    }
                })?;

            // Drain the stream fully before handing the bytes back.
            let data = output
                .body
                .collect()
                .await
                .map_err(|e| StorageError::Backend(format!("reading object body: {e}")))?;
            Ok(data.into_bytes())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        bounded(self.timeout, async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
            Ok(())
        })
        .await?;

        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Backend(format!("invalid presign ttl: {e}")))?;

        bounded(self.timeout, async {
            let request = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
            Ok(request.uri().to_string())
        })
        .await
    }
}
