//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each admin endpoint.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use feed_media_cache::media::{
    FetchResponse, Fetcher, MediaSession, PendingSession, Playback, PlaybackFlag, SessionFactory,
};
use feed_media_cache::{api::create_router, AppState, CacheConfig, MediaCache, MediaError};

// == Helper Functions ==

/// Serves a 900x300 PNG for every URL except those containing "missing".
struct PngServer;

#[async_trait]
impl Fetcher for PngServer {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, MediaError> {
        if url.path().contains("missing") {
            return Ok(FetchResponse {
                status: 404,
                body: Vec::new(),
            });
        }
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(900, 300)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        Ok(FetchResponse::ok(bytes.into_inner()))
    }
}

#[derive(Debug, Default)]
struct ReadySession(PlaybackFlag);

impl MediaSession for ReadySession {
    fn play(&self) {
        self.0.set(Playback::Playing);
    }
    fn pause(&self) {
        self.0.set(Playback::Paused);
    }
    fn release(&self) {
        self.0.set(Playback::Released);
    }
    fn playback(&self) -> Playback {
        self.0.get()
    }
}

/// Sessions that are ready immediately.
struct InstantSessions;

impl SessionFactory for InstantSessions {
    fn create(&self, _url: &Url) -> PendingSession {
        let (pending, tx) = PendingSession::new(Arc::new(ReadySession::default()));
        let _ = tx.send(Ok(()));
        pending
    }
}

fn create_test_app() -> (Router, MediaCache) {
    let cache = MediaCache::new(
        CacheConfig::default(),
        Arc::new(PngServer),
        Arc::new(InstantSessions),
    );
    let (state, _task) = AppState::with_pressure_task(cache.clone());
    (create_router(state), cache)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn encoded(key: &str) -> String {
    url::form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

async fn wait_for(app: &Router, key: &str, state: &str) -> Value {
    let uri = format!("/state?key={}", encoded(key));
    for _ in 0..400 {
        let (_, json) = send(app, get(&uri)).await;
        if json["state"] == state {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{key} never reached {state}");
}

// == Load / State / Content ==

#[tokio::test]
async fn test_load_image_then_read_content() {
    let (app, _) = create_test_app();
    let key = "https://cdn.test/img/a.jpg";

    let (status, json) = send(
        &app,
        json_request("PUT", "/load", &format!(r#"{{"key":"{key}"}}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "loading");

    wait_for(&app, key, "loaded").await;

    let (status, json) = send(&app, get(&format!("/content?key={}", encoded(key)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "image");
    assert_eq!(json["width"], 600);
    assert_eq!(json["height"], 200);
    assert_eq!(json["source_width"], 900);
}

#[tokio::test]
async fn test_load_video_reports_playback() {
    let (app, _) = create_test_app();
    let key = "https://cdn.test/vid/a.mp4";

    send(
        &app,
        json_request("PUT", "/load", &format!(r#"{{"key":"{key}","kind":"video"}}"#)),
    )
    .await;
    wait_for(&app, key, "loaded").await;

    let (status, json) = send(&app, get(&format!("/content?key={}", encoded(key)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "video");
    assert_eq!(json["playback"], "paused");
}

#[tokio::test]
async fn test_failed_load_and_retry() {
    let (app, _) = create_test_app();
    let key = "https://cdn.test/img/missing.jpg";

    send(&app, json_request("PUT", "/load", &format!(r#"{{"key":"{key}"}}"#))).await;
    let state = wait_for(&app, key, "failed").await;
    assert_eq!(state["error"]["kind"], "bad_response");
    assert_eq!(state["error"]["detail"], 404);

    let (status, json) = send(&app, json_request("POST", "/retry", &format!(r#"{{"key":"{key}"}}"#))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "loading");
    wait_for(&app, key, "failed").await;
}

#[tokio::test]
async fn test_state_of_unknown_key() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/state?key=https%3A%2F%2Fcdn.test%2Fx.jpg")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "idle");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_content_not_loaded_is_404() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/content?key=https%3A%2F%2Fcdn.test%2Fx.jpg")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("cdn.test"));
}

#[tokio::test]
async fn test_empty_key_is_400() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, json_request("PUT", "/load", r#"{"key":""}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/load", r#"{"key": }"#))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Preload ==

fn feed_json(len: usize) -> String {
    let items: Vec<String> = (0..len)
        .map(|i| format!(r#"{{"id":"{i}","url":"https://cdn.test/img/{i}.jpg"}}"#))
        .collect();
    format!("[{}]", items.join(","))
}

#[tokio::test]
async fn test_preload_window_endpoint() {
    let (app, cache) = create_test_app();
    let body = format!(
        r#"{{"current_index":10,"lookahead":5,"items":{}}}"#,
        feed_json(20)
    );

    let (status, json) = send(&app, json_request("POST", "/preload-window", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window"], serde_json::json!([8, 15]));
    assert_eq!(cache.stats().await.loads_started, 8);
}

#[tokio::test]
async fn test_preload_window_uses_configured_windows() {
    let (app, _) = create_test_app();
    let body = format!(r#"{{"current_index":0,"items":{}}}"#, feed_json(20));

    let (status, json) = send(&app, json_request("POST", "/preload-window", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window"], serde_json::json!([0, 5]));
}

#[tokio::test]
async fn test_preload_endpoint() {
    let (app, _) = create_test_app();
    let body = format!(r#"{{"items":{},"priority":"low"}}"#, feed_json(3));

    let (status, json) = send(&app, json_request("POST", "/preload", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["requested"], 3);

    wait_for(&app, "https://cdn.test/img/2.jpg", "loaded").await;
}

// == Removal ==

#[tokio::test]
async fn test_evict_endpoint() {
    let (app, _) = create_test_app();
    let key = "https://cdn.test/img/a.jpg";
    send(&app, json_request("PUT", "/load", &format!(r#"{{"key":"{key}"}}"#))).await;
    wait_for(&app, key, "loaded").await;

    let body = format!(r#"{{"key":"{key}"}}"#);
    let (status, json) = send(&app, json_request("POST", "/evict", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["evicted"], serde_json::json!([key]));

    let (status, _) = send(&app, json_request("POST", "/evict", &body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_memory_pressure_endpoint_sweeps_images() {
    let (app, cache) = create_test_app();
    for i in 0..4 {
        let key = format!("https://cdn.test/img/{i}.jpg");
        send(&app, json_request("PUT", "/load", &format!(r#"{{"key":"{key}"}}"#))).await;
        wait_for(&app, &key, "loaded").await;
    }

    let response = app
        .clone()
        .oneshot(post("/memory-pressure"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for _ in 0..400 {
        if cache.stats().await.evictions == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let (_, stats) = send(&app, get("/stats")).await;
    assert_eq!(stats["evictions"], 2);
    assert_eq!(stats["total_entries"], 2);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let (app, _) = create_test_app();
    send(&app, json_request("PUT", "/load", r#"{"key":"https://cdn.test/img/a.jpg"}"#)).await;

    let (status, json) = send(&app, post("/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 1);

    let (_, entries) = send(&app, get("/entries")).await;
    assert_eq!(entries, serde_json::json!([]));
}

// == Introspection ==

#[tokio::test]
async fn test_entries_endpoint() {
    let (app, _) = create_test_app();
    let key = "https://cdn.test/img/a.jpg";
    send(&app, json_request("PUT", "/load", &format!(r#"{{"key":"{key}"}}"#))).await;
    wait_for(&app, key, "loaded").await;

    let (status, json) = send(&app, get("/entries")).await;

    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["key"], key);
    assert_eq!(entries[0]["state"], "loaded");
    assert_eq!(entries[0]["waiting_for_slot"], false);
    assert!(entries[0]["last_access"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 0);
    assert_eq!(json["hit_rate"], 0.0);
    assert_eq!(json["active_video_loads"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = create_test_app();

    let response = app.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
