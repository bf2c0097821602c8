//! InfluxDB 3 client over the HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::InfluxDbConfig;
use crate::domain::ports::Connector;
use crate::utils::error::{AppError, BoxError, ClientKind, Result};
use crate::utils::validation::Validate;

const QUERY_PATH: &str = "api/v3/query_sql";
const WRITE_PATH: &str = "api/v3/write_lp";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct InfluxDbClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    database: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    db: &'a str,
    q: &'a str,
    format: &'static str,
}

impl InfluxDbClient {
    pub fn new(config: &InfluxDbConfig, request_timeout: Duration) -> Result<Self> {
        config.validate()?;

        let mut base = Url::parse(&config.host).map_err(|e| AppError::InvalidConfigValue {
            field: "influxdb.host".to_string(),
            value: config.host.clone(),
            reason: e.to_string(),
        })?;
        // keep any path prefix when joining API routes
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::connection(ClientKind::InfluxDb, e))?;

        Ok(Self {
            http,
            base,
            token: config.token.clone(),
            database: config.database.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::request(ClientKind::InfluxDb, e))
    }

    /// Runs a SQL query and returns the rows as JSON objects.
    pub async fn query(&self, sql: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(self.endpoint(QUERY_PATH)?)
            .bearer_auth(&self.token)
            .json(&QueryRequest {
                db: &self.database,
                q: sql,
                format: "json",
            })
            .send()
            .await
            .map_err(|e| AppError::request(ClientKind::InfluxDb, e))?;

        let body = checked(response)
            .await?
            .text()
            .await
            .map_err(|e| AppError::request(ClientKind::InfluxDb, e))?;

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Writes line protocol records to the configured database.
    pub async fn write_lp(&self, lines: impl Into<String>) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(WRITE_PATH)?)
            .query(&[("db", self.database.as_str())])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(lines.into())
            .send()
            .await
            .map_err(|e| AppError::request(ClientKind::InfluxDb, e))?;

        checked(response).await?;
        Ok(())
    }
}

async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::request(
        ClientKind::InfluxDb,
        format!("{}: {}", status_label(status), body.trim()),
    ))
}

fn status_label(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct InfluxDbConnector {
    request_timeout: Duration,
}

impl InfluxDbConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for InfluxDbConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl Connector for InfluxDbConnector {
    type Config = InfluxDbConfig;
    type Client = InfluxDbClient;

    fn kind(&self) -> ClientKind {
        ClientKind::InfluxDb
    }

    async fn connect(&self, config: &InfluxDbConfig) -> std::result::Result<InfluxDbClient, BoxError> {
        Ok(InfluxDbClient::new(config, self.request_timeout)?)
    }

    async fn probe(&self, client: &InfluxDbClient) -> std::result::Result<(), BoxError> {
        client.query("SELECT 1").await?;
        Ok(())
    }

    async fn close(&self, _client: &InfluxDbClient) -> std::result::Result<(), BoxError> {
        // no session to tear down; pooled HTTP connections go with the client
        Ok(())
    }
}
