mod common;

use std::sync::Arc;

use backend_infra::{AppError, ClientFactory, ClientKind, InfluxDbConnector};
use httpmock::prelude::*;
use serde_json::json;

use common::{closed_port, influx_config};

#[tokio::test]
async fn test_acquire_probes_with_select_one() {
    let server = MockServer::start_async().await;
    let probe = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v3/query_sql")
                .header("authorization", "Bearer test-token")
                .json_body_partial(r#"{"db":"metrics","q":"SELECT 1"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"Int64(1)":1}]"#);
        })
        .await;

    let factory = ClientFactory::new(InfluxDbConnector::default());
    let config = influx_config(server.base_url());

    let first = factory.acquire(&config).await.unwrap();
    let second = factory.acquire(&config).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.kind(), ClientKind::InfluxDb);
    assert_eq!(first.database(), "metrics");
    probe.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_rejected_token_is_connection_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v3/query_sql");
            then.status(401).body("invalid token");
        })
        .await;

    let factory = ClientFactory::new(InfluxDbConnector::default());
    let err = factory
        .acquire(&influx_config(server.base_url()))
        .await
        .unwrap_err();

    match &err {
        AppError::Connection { kind, .. } => assert_eq!(*kind, ClientKind::InfluxDb),
        other => panic!("expected Connection, got {other:?}"),
    }
    assert!(err.to_string().contains("401"));
    assert!(factory.get().is_none());
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let factory = ClientFactory::new(InfluxDbConnector::default());
    let host = format!("http://127.0.0.1:{}", closed_port());

    let err = factory.acquire(&influx_config(host)).await.unwrap_err();

    assert_eq!(err.kind(), Some(ClientKind::InfluxDb));
    assert!(factory.get().is_none());
}

#[tokio::test]
async fn test_query_returns_rows() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v3/query_sql")
                .json_body_partial(r#"{"q":"SELECT host, usage FROM cpu"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    {"host": "a", "usage": 0.5},
                    {"host": "b", "usage": 0.75}
                ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v3/query_sql")
                .json_body_partial(r#"{"q":"SELECT 1"}"#);
            then.status(200).body("[]");
        })
        .await;

    let factory = ClientFactory::new(InfluxDbConnector::default());
    let client = factory
        .acquire(&influx_config(server.base_url()))
        .await
        .unwrap();

    let rows = client.query("SELECT host, usage FROM cpu").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["host"], "b");
}

#[tokio::test]
async fn test_write_lp_posts_line_protocol() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v3/query_sql");
            then.status(200).body("[]");
        })
        .await;
    let write = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v3/write_lp")
                .query_param("db", "metrics")
                .header("authorization", "Bearer test-token")
                .body("cpu,host=a usage=0.5");
            then.status(204);
        })
        .await;

    let factory = ClientFactory::new(InfluxDbConnector::default());
    let client = factory
        .acquire(&influx_config(server.base_url()))
        .await
        .unwrap();

    client.write_lp("cpu,host=a usage=0.5").await.unwrap();
    write.assert_async().await;

    factory.close().await.unwrap();
    assert!(client.is_closed());
}
