//! Tests for Firestore client functionality against a mock REST endpoint.

use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::types::{Document, Fields, StructuredQuery, ToFirestoreValue, Write};

// =============================================================================
// Test Helpers
// =============================================================================

const DOCS: &str = "/v1/projects/test-project/databases/test-db/documents";

fn test_config(server: &MockServer) -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "test-db".to_string(),
        emulator_host: Some(server.uri()),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    }
}

async fn client_for(server: &MockServer) -> FirestoreClient {
    FirestoreClient::new(test_config(server)).await.unwrap()
}

fn video_doc(id: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/test-project/databases/test-db/documents/videos/{}", id),
        "fields": {
            "filename": {"stringValue": "clip.mp4"},
            "file_size": {"integerValue": "1024"}
        },
        "updateTime": "2025-01-01T00:00:00.000001Z"
    })
}

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_503() {
    let err = FirestoreError::from_http_status(503, "service unavailable");
    assert!(matches!(err, FirestoreError::ServerError(503, _)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_400() {
    let err = FirestoreError::from_http_status(400, "bad request");
    assert!(matches!(err, FirestoreError::RequestFailed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_400_failed_precondition() {
    let err = FirestoreError::from_http_status(400, r#"{"status":"FAILED_PRECONDITION"}"#);
    assert!(err.is_precondition_failed());
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_409() {
    let err = FirestoreError::from_http_status(409, "conflict");
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(FirestoreError::invalid_response("x").http_status(), None);
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_validates_empty_project_id() {
    std::env::set_var("GCP_PROJECT_ID", "");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    let result = FirestoreConfig::from_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_accepts_firebase_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert_eq!(config.project_id, "firebase-project");
}

#[test]
#[serial]
fn test_config_parses_retry_env_vars() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "2000");
    let config = FirestoreConfig::from_env().unwrap();
    std::env::remove_var("FIRESTORE_RETRY_BASE_MS");
    std::env::remove_var("FIRESTORE_RETRY_MAX_MS");
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.retry.max_delay_ms, 2000);
}

#[test]
#[serial]
fn test_config_handles_invalid_env_values() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    let config = FirestoreConfig::from_env().unwrap();
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
}

// =============================================================================
// REST Tests
// =============================================================================

#[tokio::test]
async fn test_get_document_parses_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/v1", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("v1")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client.get_document("videos", "v1").await.unwrap().unwrap();

    assert_eq!(doc.id(), Some("v1"));
    assert_eq!(doc.get::<String>("filename").as_deref(), Some("clip.mp4"));
    assert_eq!(doc.get::<u64>("file_size"), Some(1024));
}

#[tokio::test]
async fn test_get_document_missing_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/missing", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.get_document("videos", "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_document_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/v1", DOCS)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/v1", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("v1")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client.get_document("videos", "v1").await.unwrap();
    assert!(doc.is_some());
}

#[tokio::test]
async fn test_create_document_conflict_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/counters", DOCS)))
        .and(query_param("documentId", "videos"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut fields = Fields::new();
    fields.insert("value".to_string(), 1i64.to_firestore_value());

    let err = client
        .create_document("counters", "videos", fields)
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_delete_missing_document_returns_false() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/metadata/m1", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(!client.delete_document("metadata", "m1").await.unwrap());
}

#[tokio::test]
async fn test_run_query_collects_documents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_partial_json(json!({
            "structuredQuery": {"from": [{"collectionId": "videos"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": video_doc("a"), "readTime": "2025-01-01T00:00:00Z"},
            {"document": video_doc("b"), "readTime": "2025-01-01T00:00:00Z"},
            {"readTime": "2025-01-01T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let docs = client
        .run_query(StructuredQuery::collection("videos"))
        .await
        .unwrap();

    let ids: Vec<_> = docs.iter().filter_map(|d| d.id()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_run_count_query_reads_alias() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runAggregationQuery", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"result": {"aggregateFields": {"total": {"integerValue": "7"}}}, "readTime": "2025-01-01T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let count = client
        .run_count_query(
            StructuredQuery::collection("upload_queue")
                .where_eq("status", "pending".to_firestore_value()),
        )
        .await
        .unwrap();
    assert_eq!(count, 7);
}

#[tokio::test]
async fn test_commit_failed_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "status": "FAILED_PRECONDITION", "message": "the stored version does not match"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = Document::named(client.full_document_name("metadata", "m1"), Fields::new());
    let err = client.commit(vec![Write::set(doc)]).await.unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn test_commit_without_writes_skips_request() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let response = client.commit(vec![]).await.unwrap();
    assert!(response.write_results.unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
