//! MySQL connection pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Connection;

use crate::config::MysqlConfig;
use crate::core::factory::PROBE_TIMEOUT;
use crate::domain::ports::Connector;
use crate::utils::error::{BoxError, ClientKind};
use crate::utils::validation::Validate;

/// Used when `max_open_conns` is 0.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

fn connect_options(config: &MysqlConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database);
    if !config.charset.is_empty() {
        options = options.charset(&config.charset);
    }
    options
}

fn pool_options(config: &MysqlConfig) -> MySqlPoolOptions {
    let max_connections = if config.max_open_conns > 0 {
        config.max_open_conns
    } else {
        DEFAULT_MAX_CONNECTIONS
    };
    let max_lifetime = (config.max_lifetime > 0)
        .then(|| Duration::from_secs(config.max_lifetime.saturating_mul(60)));

    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(config.max_idle_conns.min(max_connections))
        .max_lifetime(max_lifetime)
        .acquire_timeout(PROBE_TIMEOUT)
}

#[derive(Debug, Clone, Default)]
pub struct MysqlConnector;

#[async_trait]
impl Connector for MysqlConnector {
    type Config = MysqlConfig;
    type Client = MySqlPool;

    fn kind(&self) -> ClientKind {
        ClientKind::Mysql
    }

    async fn connect(&self, config: &MysqlConfig) -> Result<MySqlPool, BoxError> {
        config.validate()?;
        // connections are opened on first acquire, i.e. by the probe
        Ok(pool_options(config).connect_lazy_with(connect_options(config)))
    }

    async fn probe(&self, pool: &MySqlPool) -> Result<(), BoxError> {
        let mut conn = pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn close(&self, pool: &MySqlPool) -> Result<(), BoxError> {
        pool.close().await;
        Ok(())
    }
}
