// Adapters layer: one connector per vendor client.

pub mod influxdb;
pub mod minio;
pub mod mysql;

pub use influxdb::{InfluxDbClient, InfluxDbConnector};
pub use minio::{MinioClient, MinioConnector};
pub use mysql::MysqlConnector;
