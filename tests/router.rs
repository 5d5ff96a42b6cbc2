//! HTTP surface tests: the full router with a mock platform and in-memory uploads.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lakehouse_relay::config::{Config, LakehouseConfig};
use lakehouse_relay::lakehouse::client::{AUTH_PATH, QUERIES_PATH};
use lakehouse_relay::storage::UploadStore;
use lakehouse_relay::{build_router, AppState};

const BOUNDARY: &str = "relay-test-boundary";

fn app_for(server: &MockServer) -> Router {
    let config = Config {
        lakehouse: LakehouseConfig {
            base_url: server.uri(),
            ..LakehouseConfig::default()
        },
        ..Config::default()
    };
    let state = AppState::with_upload_store(config, UploadStore::in_memory(1024 * 1024)).unwrap();
    build_router(Arc::new(state))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Text fields as (name, value); files as (field, file name, content type, bytes).
fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (field, file_name, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, field, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "tok-9", "expires_in": 3600})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_health_reports_environment_and_hardening_headers() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, headers, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "development");
    assert!(body["uptime"].is_u64());

    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, req).await;
    assert_eq!(headers["x-request-id"], "trace-abc");
}

#[tokio::test]
async fn test_unknown_path_returns_error_envelope() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, get("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["path"], "/api/nowhere");
}

#[tokio::test]
async fn test_login_then_status_then_logout() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, get("/api/auth/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["present"], false);

    let (status, body) = send_json(&app, post_json("/api/auth/login", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token"], "tok-9");
    assert_eq!(body["data"]["tokenInfo"]["present"], true);
    assert_eq!(body["data"]["tokenInfo"]["expired"], false);

    let (_, body) = send_json(&app, post_json("/api/auth/logout", json!({}))).await;
    assert_eq!(body["message"], "Logged out successfully");

    let (_, body) = send_json(&app, get("/api/auth/status")).await;
    assert_eq!(body["data"]["present"], false);
}

#[tokio::test]
async fn test_login_failure_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, post_json("/api/auth/login", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "authentication_error");
}

#[tokio::test]
async fn test_execute_requires_sql() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, post_json("/api/query/execute", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SQL query is required");
}

#[tokio::test]
async fn test_destructive_sql_is_rejected_without_platform_calls() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, body) = send_json(
        &app,
        post_json("/api/query/execute", json!({"sql": "DROP TABLE sales"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
    assert!(server.received_requests().await.unwrap().is_empty());

    let (_, body) = send_json(&app, get("/api/query/history")).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_execute_uses_default_catalog_and_records_history() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path(QUERIES_PATH))
        .and(wiremock::matchers::body_partial_json(json!({
            "catalog": "iceberg_data",
            "schema": "default",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query_id": "q-77"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/q-77", QUERIES_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "columns": [{"name": "one", "type": "integer"}],
            "rows": [{"one": 1}],
        })))
        .mount(&server)
        .await;
    let app = app_for(&server);

    let (status, body) = send_json(
        &app,
        post_json("/api/query/execute", json!({"sql": "SELECT 1 AS one", "catalog": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["queryId"], "q-77");
    assert_eq!(body["data"]["rowCount"], 1);
    assert_eq!(body["data"]["status"], "completed");

    let (_, body) = send_json(&app, get("/api/query/history?limit=5")).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "q-77");
    assert_eq!(entries[0]["status"], "completed");
    assert_eq!(entries[0]["catalog"], "iceberg_data");

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/query/history")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send_json(&app, get("/api/query/history")).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_export_csv_is_an_attachment() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let req = post_json(
        "/api/query/export",
        json!({
            "columns": [{"name": "id", "type": "int"}, {"name": "note", "type": "varchar"}],
            "rows": [{"id": 1, "note": "a,b"}, {"id": 2, "note": null}],
        }),
    );
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"query_results_"));
    assert!(disposition.ends_with(".csv\""));
    assert_eq!(String::from_utf8(body).unwrap(), "id,note\n1,\"a,b\"\n2,");
}

#[tokio::test]
async fn test_export_requires_columns_and_rows() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, body) = send_json(
        &app,
        post_json("/api/query/export", json!({"rows": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Columns and rows are required");
}

#[tokio::test]
async fn test_invalid_catalog_name_is_rejected_before_network() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, get("/api/catalog/bad%20name")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingestion_file_types_and_validation() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let (_, body) = send_json(&app, get("/api/ingestion/file-types")).await;
    assert_eq!(body["data"], json!(["json", "csv", "parquet", "avro", "orc"]));

    let (status, body) = send_json(
        &app,
        post_json(
            "/api/ingestion/jobs",
            json!({
                "target": {"catalog": "c", "schema": "s"},
                "source": {"file_paths": "s3://b/x.csv", "file_type": "xlsx"},
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ingestion configuration");
    assert_eq!(
        body["errors"],
        json!([
            "Target table is required",
            "Invalid file type. Must be one of: json, csv, parquet, avro, orc",
        ])
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_file_upload_to_memory_bucket() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let req = multipart(
        &[("bucket", "landing"), ("path", "/raw/")],
        &[("file", "orders.csv", "text/csv", b"id,total\n1,9.5\n")],
    );
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["key"], "raw/orders.csv");
    assert_eq!(body["data"]["s3Path"], "s3://landing/raw/orders.csv");
    assert_eq!(body["data"]["size"], 15);
    assert_eq!(body["data"]["contentType"], "text/csv");
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension_and_missing_bucket() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let req = multipart(
        &[("bucket", "landing")],
        &[("file", "tool.exe", "application/octet-stream", b"MZ")],
    );
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("File type not allowed"));

    let req = multipart(&[], &[("file", "a.json", "application/json", b"{}")]);
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bucket name is required");
}

#[tokio::test]
async fn test_multiple_upload_reports_each_file() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let mut req = multipart(
        &[("bucket", "landing")],
        &[
            ("files", "a.json", "application/json", b"{}"),
            ("files", "b.txt", "text/plain", b"nope"),
        ],
    );
    *req.uri_mut() = "/api/upload/multiple".parse().unwrap();

    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["successful"], 1);
    assert_eq!(body["data"]["failed"][0]["fileName"], "b.txt");
}

#[tokio::test]
async fn test_monitoring_counts_requests_and_exports_prometheus() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    send(&app, get("/health")).await;
    send(&app, get("/health")).await;
    send(&app, get("/api/nowhere")).await;

    let (status, body) = send_json(&app, get("/api/monitoring/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["requests"]["total"], 3);
    assert_eq!(body["data"]["requests"]["success"], 2);
    assert_eq!(body["data"]["requests"]["failed"], 1);
    assert!(body["data"]["system"]["cpu"]["cores"].is_u64());

    let (status, headers, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("lakehouse_relay_requests_total"));

    let (_, body) = send_json(&app, post_json("/api/monitoring/reset", json!({}))).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_platform_health_never_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = app_for(&server);

    let (status, body) = send_json(&app, get("/api/monitoring/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "unhealthy");
    assert_eq!(body["data"]["connected"], false);
}
