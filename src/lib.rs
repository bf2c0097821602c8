pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{InfluxDbClient, InfluxDbConnector, MinioClient, MinioConnector, MysqlConnector};
pub use config::{AppConfig, InfluxDbConfig, MinioConfig, MysqlConfig};
pub use crate::core::app::{bootstrap, AppClients, ClientRegistry};
pub use crate::core::factory::{ClientFactory, ClientHandle, PROBE_TIMEOUT};
pub use utils::error::{AppError, ClientKind, Result};
pub use utils::logger::{LogConfig, LogContext};
