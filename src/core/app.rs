use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{InfluxDbConnector, MinioConnector, MysqlConnector};
use crate::config::AppConfig;
use crate::core::factory::{ClientFactory, ClientHandle};
use crate::domain::ports::Connector;
use crate::utils::error::{AppError, ClientKind, Result};
use crate::utils::logger;

/// One factory per vendor kind. Built once by the entry point and passed
/// to whatever needs a client.
#[derive(Debug)]
pub struct ClientRegistry {
    pub influxdb: ClientFactory<InfluxDbConnector>,
    pub minio: ClientFactory<MinioConnector>,
    pub mysql: ClientFactory<MysqlConnector>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            influxdb: ClientFactory::new(InfluxDbConnector::default()),
            minio: ClientFactory::new(MinioConnector),
            mysql: ClientFactory::new(MysqlConnector),
        }
    }

    pub fn with_probe_timeout(self, probe_timeout: Duration) -> Self {
        Self {
            influxdb: self.influxdb.with_probe_timeout(probe_timeout),
            minio: self.minio.with_probe_timeout(probe_timeout),
            mysql: self.mysql.with_probe_timeout(probe_timeout),
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The three live clients the service runs with.
#[derive(Debug, Clone)]
pub struct AppClients {
    pub influxdb: Arc<ClientHandle<InfluxDbConnector>>,
    pub minio: Arc<ClientHandle<MinioConnector>>,
    pub mysql: Arc<ClientHandle<MysqlConnector>>,
}

impl AppClients {
    /// Acquires InfluxDB, MinIO and MySQL in that order, stopping at the first failure.
    pub async fn connect(config: &AppConfig, registry: &ClientRegistry) -> Result<Self> {
        let influxdb = registry.influxdb.acquire(&config.influxdb).await?;
        let minio = registry.minio.acquire(&config.minio).await?;
        let mysql = registry.mysql.acquire(&config.mysql).await?;

        Ok(Self {
            influxdb,
            minio,
            mysql,
        })
    }

    /// Closes every client; reports the first close error after trying all three.
    pub async fn shutdown(&self) -> Result<()> {
        let clients: [&dyn Closeable; 3] = [&*self.influxdb, &*self.minio, &*self.mysql];
        close_in_turn(&clients).await
    }
}

/// A client teardown can close without knowing its vendor type.
#[async_trait]
pub(crate) trait Closeable: Send + Sync {
    fn kind(&self) -> ClientKind;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<C: Connector> Closeable for ClientHandle<C> {
    fn kind(&self) -> ClientKind {
        ClientHandle::kind(self)
    }

    async fn close(&self) -> Result<()> {
        ClientHandle::close(self).await
    }
}

async fn close_in_turn(clients: &[&dyn Closeable]) -> Result<()> {
    let mut first_error: Option<AppError> = None;
    for client in clients {
        if let Err(e) = client.close().await {
            tracing::error!(kind = %client.kind(), error = %e, "client close failed");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            tracing::info!("客戶端關閉成功");
            Ok(())
        }
    }
}

/// 載入配置並依序初始化所有客戶端
///
/// A `log` section in the file replaces the startup logger before any
/// client is dialed.
pub async fn bootstrap(config_path: &str, registry: &ClientRegistry) -> Result<AppClients> {
    let config = AppConfig::load(config_path)?;
    tracing::debug!(?config, "configuration loaded");

    if let Some(log) = &config.log {
        logger::init_global(log.clone())?;
        tracing::info!(level = %log.level, "logger reconfigured from config file");
    }

    AppClients::connect(&config, registry).await
}
