use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use super::object_store::ObjectStore;
use crate::config::{
    DEFAULT_S3_ACCESS_KEY, DEFAULT_S3_ENDPOINT, DEFAULT_S3_REGION, DEFAULT_S3_SECRET_KEY,
};

/// Connection settings for an S3-compatible endpoint (AWS S3, MinIO, ...)
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_S3_ENDPOINT.to_string(),
            access_key: DEFAULT_S3_ACCESS_KEY.to_string(),
            secret_key: DEFAULT_S3_SECRET_KEY.to_string(),
            region: DEFAULT_S3_REGION.to_string(),
        }
    }
}

/// ObjectStore implementation backed by an S3-compatible API
#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: S3Client,
    endpoint: String,
}

impl S3ObjectStore {
    /// Build a client for the configured endpoint using static credentials.
    ///
    /// No request is made here; an unreachable endpoint surfaces on the first
    /// `get_object` call.
    pub async fn connect(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "data-pipeline-static",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(&settings.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO and most self-hosted stores only support path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            s3_client: S3Client::from_conf(s3_config),
            endpoint: settings.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch s3://{}/{}", bucket, key))?;

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", bucket, key))?
            .into_bytes();

        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}
