//! MinIO (S3-compatible) client.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;

use crate::config::MinioConfig;
use crate::domain::ports::Connector;
use crate::utils::error::{AppError, BoxError, ClientKind, Result};
use crate::utils::validation::Validate;

/// MinIO ignores the region, the signer still needs one.
pub const DEFAULT_REGION: &str = "us-east-1";

const CREDENTIALS_SOURCE: &str = "backend-config";

#[derive(Debug, Clone)]
pub struct MinioClient {
    s3: Client,
    endpoint: String,
}

impl MinioClient {
    pub async fn new(config: &MinioConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = endpoint_url(config);
        let region = if config.region.trim().is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            config.region.clone()
        };
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            CREDENTIALS_SOURCE,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true) // MinIO serves buckets by path
            .build();

        Ok(Self {
            s3: Client::from_conf(s3_config),
            endpoint,
        })
    }

    pub fn s3(&self) -> &Client {
        &self.s3
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| AppError::request(ClientKind::Minio, DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.s3.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    tracing::debug!(bucket = %bucket, "bucket not found");
                    Ok(false)
                } else {
                    Err(AppError::request(
                        ClientKind::Minio,
                        DisplayErrorContext(&service_err).to_string(),
                    ))
                }
            }
        }
    }
}

fn endpoint_url(config: &MinioConfig) -> String {
    let scheme = if config.use_ssl { "https" } else { "http" };
    format!("{scheme}://{}", config.endpoint.trim())
}

#[derive(Debug, Clone, Default)]
pub struct MinioConnector;

#[async_trait]
impl Connector for MinioConnector {
    type Config = MinioConfig;
    type Client = MinioClient;

    fn kind(&self) -> ClientKind {
        ClientKind::Minio
    }

    async fn connect(&self, config: &MinioConfig) -> std::result::Result<MinioClient, BoxError> {
        Ok(MinioClient::new(config).await?)
    }

    async fn probe(&self, client: &MinioClient) -> std::result::Result<(), BoxError> {
        client
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| DisplayErrorContext(&e).to_string())?;
        Ok(())
    }

    async fn close(&self, _client: &MinioClient) -> std::result::Result<(), BoxError> {
        // stateless HTTP client, dropped with the handle
        Ok(())
    }
}
