#[cfg(feature = "cli")]
pub mod cli;

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::utils::error::{AppError, Result};
use crate::utils::logger::LogConfig;
use crate::utils::validation::{
    validate_endpoint, validate_non_empty_string, validate_positive_number, validate_url, Validate,
};

pub const DEFAULT_CONFIG_PATH: &str = "./config/dev.yaml";

/// Top-level configuration, read once at startup and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub influxdb: InfluxDbConfig,
    pub minio: MinioConfig,
    pub mysql: MysqlConfig,
    /// Replaces the startup logger once the file is loaded.
    pub log: Option<LogConfig>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxDbConfig {
    pub host: String,
    pub token: String,
    pub database: String,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinioConfig {
    /// `host:port`, no scheme
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub region: String,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    /// Minutes a pooled connection may live; 0 keeps it forever.
    pub max_lifetime: u64,
}

impl AppConfig {
    /// 從 YAML 檔案載入配置，空路徑使用預設路徑
    pub fn load(path: &str) -> Result<Self> {
        let path = if path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            path
        };

        let content = std::fs::read_to_string(Path::new(path)).map_err(|source| {
            AppError::ConfigRead {
                path: path.to_string(),
                source,
            }
        })?;

        Self::decode(path, &content)
    }

    /// 從 YAML 字串解析配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::decode("<inline>", content)
    }

    fn decode(origin: &str, content: &str) -> Result<Self> {
        let decode_err = |source| AppError::ConfigDecode {
            path: origin.to_string(),
            source,
        };

        let mut document: Value = serde_yaml::from_str(content).map_err(decode_err)?;
        if document.is_null() {
            document = Value::Mapping(Mapping::new());
        }
        // 只替換已解析的字串值，環境變數內容不經過 YAML 轉義
        substitute_env_vars(&mut document);
        serde_yaml::from_value(document).map_err(decode_err)
    }
}

/// Expands placeholders inside every string scalar of a parsed document.
fn substitute_env_vars(value: &mut Value) {
    match value {
        Value::String(text) if text.contains("${") => *text = expand_env_vars(text),
        Value::Sequence(items) => items.iter_mut().for_each(substitute_env_vars),
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                substitute_env_vars(item);
            }
        }
        Value::Tagged(tagged) => substitute_env_vars(&mut tagged.value),
        _ => {}
    }
}

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
/// Unset variables without a default are left untouched.
fn expand_env_vars(text: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    re.replace_all(text, |caps: &regex::Captures| {
        match (std::env::var(&caps[1]), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => caps[0].to_string(),
        }
    })
    .into_owned()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

impl fmt::Debug for InfluxDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbConfig")
            .field("host", &self.host)
            .field("token", &redact(&self.token))
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Debug for MinioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinioConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .finish()
    }
}

impl fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

impl Validate for InfluxDbConfig {
    fn validate(&self) -> Result<()> {
        validate_url("influxdb.host", &self.host)?;
        validate_non_empty_string("influxdb.token", &self.token)?;
        validate_non_empty_string("influxdb.database", &self.database)?;
        Ok(())
    }
}

impl Validate for MinioConfig {
    fn validate(&self) -> Result<()> {
        validate_endpoint("minio.endpoint", &self.endpoint)?;
        validate_non_empty_string("minio.access_key_id", &self.access_key_id)?;
        validate_non_empty_string("minio.secret_access_key", &self.secret_access_key)?;
        Ok(())
    }
}

impl Validate for MysqlConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("mysql.host", &self.host)?;
        validate_positive_number("mysql.port", usize::from(self.port), 1)?;
        validate_non_empty_string("mysql.user", &self.user)?;
        validate_non_empty_string("mysql.database", &self.database)?;
        Ok(())
    }
}
