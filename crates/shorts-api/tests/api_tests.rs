//! Router-level tests against the in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use shorts_api::{create_router, ApiConfig, AppState, StoreBackend};
use shorts_queue::InMemoryStore;

const BOUNDARY: &str = "shorts-test-boundary";

fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = ApiConfig {
        rate_limit_rps: 0,
        metrics_enabled: false,
        upload_dir: dir.path().to_path_buf(),
        store_backend: StoreBackend::Memory,
        ..ApiConfig::default()
    };
    let state = AppState::with_store(config, Arc::new(InMemoryStore::new()));
    (create_router(state, None), dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/videos/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn upload(app: &Router, filename: &str) -> String {
    let (status, body) = send(app, multipart_upload("file", filename, b"fake video bytes")).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    body["video_id"].as_str().unwrap().to_string()
}

async fn create_metadata(app: &Router, title: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/metadata",
            json!({ "title": title, "description": "desc", "hashtags": ["shorts"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "metadata create failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_banner() {
    let (app, _dir) = test_app();
    for uri in ["/api", "/api/"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["message"], "YouTube Shorts Automation Server API");
    }
}

#[tokio::test]
async fn test_health_and_request_id() {
    let (app, _dir) = test_app();
    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_upload_stores_file_and_registers_video() {
    let (app, dir) = test_app();
    let video_id = upload(&app, "holiday.mp4").await;

    let (status, video) = send(&app, get(&format!("/api/videos/{video_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(video["filename"], "holiday.mp4");
    assert_eq!(video["file_size"], 16);
    assert_eq!(video["status"], "uploaded");
    assert_eq!(video["sequence_number"], 1);

    let stored: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_upload_rejects_bad_extension() {
    let (app, dir) = test_app();
    let (status, body) = send(&app, multipart_upload("file", "notes.txt", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Only"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, multipart_upload("other", "clip.mp4", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No file selected");
}

#[tokio::test]
async fn test_get_unknown_video_is_404() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, get("/api/videos/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Video not found");
}

#[tokio::test]
async fn test_metadata_bulk_and_unused() {
    let (app, _dir) = test_app();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/metadata/bulk",
            json!([
                { "title": "One", "description": "", "hashtags": [] },
                { "title": "Two", "description": "", "hashtags": ["#fun"] },
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Created 2 metadata entries");

    let (_, unused) = send(&app, get("/api/metadata/unused")).await;
    let titles: Vec<&str> = unused
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["One", "Two"]);
}

#[tokio::test]
async fn test_metadata_requires_title() {
    let (app, _dir) = test_app();
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/metadata",
            json!({ "title": "  ", "description": "", "hashtags": [] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_queue_unknown_video_is_404() {
    let (app, _dir) = test_app();
    let metadata_id = create_metadata(&app, "Title").await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue",
            json!({ "video_id": "nope", "metadata_id": metadata_id, "schedule_interval": "1h" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Video not found");
}

#[tokio::test]
async fn test_queue_rejects_unknown_interval() {
    let (app, _dir) = test_app();
    let video_id = upload(&app, "a.mp4").await;
    let metadata_id = create_metadata(&app, "Title").await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue",
            json!({ "video_id": video_id, "metadata_id": metadata_id, "schedule_interval": "2h" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("2h"));
}

#[tokio::test]
async fn test_queue_requires_interval() {
    let (app, _dir) = test_app();
    let video_id = upload(&app, "a.mp4").await;
    let metadata_id = create_metadata(&app, "Title").await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue",
            json!({ "video_id": video_id, "metadata_id": metadata_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (_, unused) = send(&app, get("/api/metadata/unused")).await;
    assert_eq!(unused.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mistyped_bodies_are_400_with_detail() {
    let (app, _dir) = test_app();
    let cases = [
        ("/api/metadata", json!({ "description": "no title" })),
        ("/api/metadata/bulk", json!({ "title": "not a list" })),
        ("/api/configs", json!({ "client_secret": "s", "channel_id": "UC1" })),
    ];
    for (uri, body) in cases {
        let (status, response) = send(&app, json_request(Method::POST, uri, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(response["detail"].is_string(), "{uri}: {response}");
    }
}

#[tokio::test]
async fn test_admit_then_update_status_and_dashboard() {
    let (app, _dir) = test_app();
    let video_id = upload(&app, "a.mp4").await;
    let metadata_id = create_metadata(&app, "Title").await;

    let (status, entry) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue",
            json!({ "video_id": video_id, "metadata_id": metadata_id, "schedule_interval": "immediately" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["status"], "pending");
    let queue_id = entry["id"].as_str().unwrap().to_string();

    let (_, pending) = send(&app, get("/api/queue/pending")).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (_, unused) = send(&app, get("/api/metadata/unused")).await;
    assert!(unused.as_array().unwrap().is_empty());

    let (status, updated) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/queue/{queue_id}/status"),
            json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");

    let (_, stats) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(stats["total_videos"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["pending"], 0);
    assert_eq!(stats["unused_metadata"], 0);
}

#[tokio::test]
async fn test_sequential_schedules_available_pairs() {
    let (app, _dir) = test_app();
    let mut videos = Vec::new();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        videos.push(upload(&app, name).await);
    }
    let first_meta = create_metadata(&app, "M1").await;
    create_metadata(&app, "M2").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue/sequential",
            json!({ "schedule_interval": "30m", "start_sequence": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled_count"], 2);

    let (_, queue) = send(&app, get("/api/queue")).await;
    let queue = queue.as_array().unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0]["video_id"], videos[0].as_str());
    assert_eq!(queue[0]["metadata_id"], first_meta.as_str());
    assert_eq!(queue[0]["schedule_interval"], "30m");
}

#[tokio::test]
async fn test_sequential_empty_body_uses_defaults() {
    let (app, _dir) = test_app();
    upload(&app, "a.mp4").await;
    create_metadata(&app, "M1").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/queue/sequential")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled_count"], 1);
    assert_eq!(body["schedule_interval"], "immediately");
}

#[tokio::test]
async fn test_sequential_invalid_json_is_400() {
    let (app, _dir) = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/queue/sequential")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_create_masks_secret_and_activates() {
    let (app, _dir) = test_app();
    let (status, created) = send(
        &app,
        json_request(
            Method::POST,
            "/api/configs",
            json!({
                "client_id": "client",
                "client_secret": "abcdefgh1234",
                "refresh_token": "token",
                "channel_id": "UC1",
                "default_privacy": "private"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["client_secret"], "********1234");
    assert_eq!(created["has_refresh_token"], true);
    assert_eq!(created["is_active"], true);

    let (status, active) = send(&app, get("/api/configs/active")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["id"], created["id"]);
}

#[tokio::test]
async fn test_no_active_config_is_404() {
    let (app, _dir) = test_app();
    let (status, _) = send(&app, get("/api/configs/active")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_delete_video_removes_file() {
    let (app, dir) = test_app();
    let video_id = upload(&app, "clip.mov").await;
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let uri = format!("/api/videos/{video_id}");
    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Video deleted successfully");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Video not found");
}

#[tokio::test]
async fn test_delete_metadata() {
    let (app, _dir) = test_app();
    let metadata_id = create_metadata(&app, "Gone soon").await;

    let uri = format!("/api/metadata/{metadata_id}");
    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Metadata deleted successfully");

    let (_, all) = send(&app, get("/api/metadata")).await;
    assert!(all.as_array().unwrap().is_empty());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Metadata not found");
}

#[tokio::test]
async fn test_delete_queue_entry_keeps_metadata_used() {
    let (app, _dir) = test_app();
    let video_id = upload(&app, "a.mp4").await;
    let metadata_id = create_metadata(&app, "Title").await;
    let (_, entry) = send(
        &app,
        json_request(
            Method::POST,
            "/api/queue",
            json!({ "video_id": video_id, "metadata_id": metadata_id, "schedule_interval": "3h" }),
        ),
    )
    .await;
    let uri = format!("/api/queue/{}", entry["id"].as_str().unwrap());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Queue entry deleted successfully");

    let (_, queue) = send(&app, get("/api/queue")).await;
    assert!(queue.as_array().unwrap().is_empty());
    let (_, unused) = send(&app, get("/api/metadata/unused")).await;
    assert!(unused.as_array().unwrap().is_empty());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_delete_active_config_leaves_none_active() {
    let (app, _dir) = test_app();
    let (_, created) = send(
        &app,
        json_request(
            Method::POST,
            "/api/configs",
            json!({ "client_id": "c", "client_secret": "secret", "channel_id": "UC1" }),
        ),
    )
    .await;
    let uri = format!("/api/configs/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Configuration deleted successfully");

    let (status, body) = send(&app, get("/api/configs/active")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
