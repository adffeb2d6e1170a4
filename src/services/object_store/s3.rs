//! S3-compatible object store.

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use tracing::debug;

/// Object store talking to S3, or to any service speaking its API when an
/// endpoint override is configured.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain, with the region,
    /// endpoint and addressing style taken from `config` when set.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.path_style {
            s3_builder = s3_builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> ObjectStoreResult<()> {
        debug!(bucket, key, size = content.len(), "uploading content to S3 bucket");

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .map_err(|err| ObjectStoreError::Backend(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<Bytes> {
        debug!(bucket, key, "downloading content from S3 bucket");

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key());
                if missing {
                    ObjectStoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Backend(DisplayErrorContext(&err).to_string())
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| ObjectStoreError::Backend(err.to_string()))?;
        Ok(body.into_bytes())
    }
}
