//! Object storage for uploaded images.
//!
//! Images are written under their original file name and addressed by a deterministic public
//! URL; nothing checks that the object is actually readable at that URL.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client as S3Client, config::Region, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use thiserror::Error;
use tracing::instrument;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("failed to store object {key}: {source:#}")]
    Put {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A bucket that accepts image bytes and hands back where they can be fetched.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key`
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> Result<(), ObjectStoreError>;

    /// Public URL of the object stored under `key`
    fn public_url(&self, key: &str) -> String;
}

/// `https://{bucket}.s3.{region}.amazonaws.com/{key}`, or `{public_base_url}/{key}` when a base is
/// configured.
pub fn public_url(config: &StorageConfig, key: &str) -> String {
    match &config.public_base_url {
        Some(base) => format!("{}/{}", base.as_str().trim_end_matches('/'), key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", config.bucket, config.region, key),
    }
}

pub struct S3ObjectStore {
    client: S3Client,
    config: StorageConfig,
}

impl S3ObjectStore {
    /// Build a client from static credentials when configured, otherwise from the default AWS
    /// credential chain.
    pub async fn new(config: &StorageConfig) -> Self {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "imgscribe-config");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest()).region(region).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.config.bucket, size = bytes.len()), err)]
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Put {
                key: key.to_string(),
                source: anyhow::anyhow!("{}", DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.config, key)
    }
}
