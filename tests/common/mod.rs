#![allow(dead_code)]

use std::net::TcpListener;

use backend_infra::{InfluxDbConfig, MinioConfig};

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn influx_config(host: String) -> InfluxDbConfig {
    InfluxDbConfig {
        host,
        token: "test-token".to_string(),
        database: "metrics".to_string(),
    }
}

pub fn minio_config(endpoint: String) -> MinioConfig {
    MinioConfig {
        endpoint,
        access_key_id: "minioadmin".to_string(),
        secret_access_key: "minioadmin".to_string(),
        use_ssl: false,
        region: String::new(),
    }
}

pub const LIST_BUCKETS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Owner><ID>minio</ID><DisplayName>minio</DisplayName></Owner><Buckets><Bucket><Name>raw</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket><Bucket><Name>archive</Name><CreationDate>2024-02-01T00:00:00.000Z</CreationDate></Bucket></Buckets></ListAllMyBucketsResult>"#;
