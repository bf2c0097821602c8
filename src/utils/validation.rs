use crate::utils::error::{AppError, Result};
use url::Url;

/// Checks that a leaf configuration carries everything its client needs to dial.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> AppError {
    AppError::InvalidConfigValue {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

/// `host:port` or bare host, without a scheme.
pub fn validate_endpoint(field_name: &str, endpoint: &str) -> Result<()> {
    validate_non_empty_string(field_name, endpoint)?;

    if endpoint.contains("://") {
        return Err(invalid(
            field_name,
            endpoint,
            "Endpoint must not include a scheme; use use_ssl to pick http/https",
        ));
    }
    if endpoint.contains('/') {
        return Err(invalid(field_name, endpoint, "Endpoint must not include a path"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("influxdb.host", "https://example.com").is_ok());
        assert!(validate_url("influxdb.host", "http://localhost:8181").is_ok());
        assert!(validate_url("influxdb.host", "").is_err());
        assert!(validate_url("influxdb.host", "invalid-url").is_err());
        assert!(validate_url("influxdb.host", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("minio.endpoint", "localhost:9000").is_ok());
        assert!(validate_endpoint("minio.endpoint", "play.min.io").is_ok());
        assert!(validate_endpoint("minio.endpoint", "http://localhost:9000").is_err());
        assert!(validate_endpoint("minio.endpoint", "localhost:9000/bucket").is_err());
        assert!(validate_endpoint("minio.endpoint", "  ").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("mysql.port", 3306, 1).is_ok());
        assert!(validate_positive_number("mysql.port", 0, 1).is_err());
    }

    #[test]
    fn test_validate_non_empty_string_reports_field() {
        let err = validate_non_empty_string("mysql.user", "").unwrap_err();
        assert!(err.to_string().contains("mysql.user"));
    }
}
