use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::utils::logger::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "backend")]
#[command(about = "Connects the InfluxDB, MinIO and MySQL clients for the backend service")]
pub struct CliArgs {
    #[arg(long, env = "APP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Logging preset used until the config file is loaded
    #[arg(long, env = "APP_ENV", value_enum, default_value = "dev")]
    pub env: Environment,

    #[arg(long, help = "Force debug level logging")]
    pub verbose: bool,
}

impl CliArgs {
    pub fn log_config(&self) -> LogConfig {
        let mut cfg = match self.env {
            Environment::Dev => LogConfig::development(),
            Environment::Prod => LogConfig::production(),
        };
        if self.verbose {
            cfg.level = "debug".to_string();
        }
        cfg
    }
}
