use std::fmt;
use thiserror::Error;

/// Boxed cause carried by connection and close failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The vendor client kinds wired by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    InfluxDb,
    Minio,
    Mysql,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::InfluxDb => "influxdb",
            ClientKind::Minio => "minio",
            ClientKind::Mysql => "mysql",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("read config failed ({path}): {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unmarshal config failed ({path}): {source}")]
    ConfigDecode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} connection failed: {source}")]
    Connection {
        kind: ClientKind,
        #[source]
        source: BoxError,
    },

    #[error("{kind} close failed: {source}")]
    Close {
        kind: ClientKind,
        #[source]
        source: BoxError,
    },

    #[error("{kind} request failed: {source}")]
    Request {
        kind: ClientKind,
        #[source]
        source: BoxError,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("Invalid config value for '{field}': {reason} (value: '{value}')")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl AppError {
    pub fn connection(kind: ClientKind, source: impl Into<BoxError>) -> Self {
        AppError::Connection {
            kind,
            source: source.into(),
        }
    }

    pub fn close(kind: ClientKind, source: impl Into<BoxError>) -> Self {
        AppError::Close {
            kind,
            source: source.into(),
        }
    }

    pub fn request(kind: ClientKind, source: impl Into<BoxError>) -> Self {
        AppError::Request {
            kind,
            source: source.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        AppError::Logging {
            message: message.into(),
        }
    }

    /// Vendor kind the error belongs to, if any.
    pub fn kind(&self) -> Option<ClientKind> {
        match self {
            AppError::Connection { kind, .. }
            | AppError::Close { kind, .. }
            | AppError::Request { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_message_names_kind() {
        let err = AppError::connection(ClientKind::Mysql, "ping timed out");
        assert_eq!(err.to_string(), "mysql connection failed: ping timed out");
        assert_eq!(err.kind(), Some(ClientKind::Mysql));
    }

    #[test]
    fn test_config_errors_have_no_kind() {
        let err = AppError::ConfigRead {
            path: "./missing.yaml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("./missing.yaml"));
        assert_eq!(err.kind(), None);
    }
}
