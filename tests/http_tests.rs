//! HTTP endpoint integration tests.
//!
//! Drives the router in-process through `tower::ServiceExt::oneshot`:
//! - `/documents` - Create and fetch wrapped documents
//! - `/raw/{id}` - Plain-text document delivery
//! - `/health` - Health check endpoint
//! - Rate limiting

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use haste::config::{KeyGeneratorConfig, RateLimitConfig};
use haste::handler::DocumentHandler;
use haste::http::{AppState, router};
use haste::keygen::KeyGenerator;
use haste::store::DocumentStore;

const MAX_LENGTH: usize = 64;

fn test_handler() -> DocumentHandler {
    let generator = KeyGenerator::from_config(&KeyGeneratorConfig::Random { keyspace: None }, 5)
        .expect("Failed to build key generator");
    DocumentHandler::new(DocumentStore::memory(), generator, MAX_LENGTH)
}

fn test_app() -> Router {
    router(AppState::new(test_handler()))
}

async fn send(app: &Router, method: Method, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("Failed to build request");
    app.clone().oneshot(request).await.expect("Request failed")
}

async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    resp.into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

async fn body_json(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("Failed to parse JSON")
}

async fn create(app: &Router, content: &str) -> String {
    let resp = send(app, Method::POST, "/documents", content.to_string()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    body["key"].as_str().expect("Missing 'key' field").to_string()
}

fn content_type(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .expect("No content-type header")
        .to_str()
        .expect("Invalid content-type")
}

// =============================================================================
// Document Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_post_then_get_round_trip() {
    let app = test_app();
    let key = create(&app, "fn main() {}\n").await;

    assert_eq!(key.len(), 5);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

    let resp = send(&app, Method::GET, &format!("/documents/{key}"), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(content_type(&resp).contains("application/json"));

    let body = body_json(resp).await;
    assert_eq!(body["data"], "fn main() {}\n");
    assert_eq!(body["key"], key.as_str());
}

#[tokio::test]
async fn test_raw_is_plain_text() {
    let app = test_app();
    let key = create(&app, "<script>alert(1)</script>").await;

    let resp = send(&app, Method::GET, &format!("/raw/{key}.html"), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "text/plain; charset=utf-8");
    assert_eq!(body_bytes(resp).await, b"<script>alert(1)</script>");
}

#[tokio::test]
async fn test_extension_is_stripped() {
    let app = test_app();
    let key = create(&app, "hello").await;

    let resp = send(&app, Method::GET, &format!("/documents/{key}.rs"), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["key"], key.as_str());
}

#[tokio::test]
async fn test_missing_document_returns_404() {
    let app = test_app();

    let resp = send(&app, Method::GET, "/raw/doesnotexist", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::GET, "/documents/doesnotexist", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert!(body["message"].as_str().is_some(), "Missing 'message' field");
}

#[tokio::test]
async fn test_head_has_status_but_no_body() {
    let app = test_app();
    let key = create(&app, "headless").await;

    let resp = send(&app, Method::HEAD, &format!("/raw/{key}"), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&app, Method::HEAD, "/documents/doesnotexist", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn test_oversized_post_rejected() {
    let app = test_app();

    let resp = send(&app, Method::POST, "/documents", "x".repeat(MAX_LENGTH + 1)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body.get("key").is_none());
    assert!(body["message"].as_str().is_some());

    // Exactly at the limit is accepted
    let resp = send(&app, Method::POST, "/documents", "x".repeat(MAX_LENGTH)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_and_binary_posts_rejected() {
    let app = test_app();

    let resp = send(&app, Method::POST, "/documents", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, Method::POST, "/documents", vec![0xffu8, 0xfe, 0xfd]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let app = test_app();

    let resp = send(&app, Method::GET, "/raw/bad%2Fkey", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let resp = send(&app, Method::GET, "/health", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

// =============================================================================
// Rate Limiting Tests
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let state = AppState::new(test_handler())
        .with_rate_limit(Some(&RateLimitConfig {
            max_requests: 2,
            window_secs: 60,
        }))
        .expect("Failed to build rate limiter");
    let app = router(state);

    for _ in 0..2 {
        let resp = send(&app, Method::GET, "/raw/doesnotexist", Body::empty()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let resp = send(&app, Method::GET, "/raw/doesnotexist", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = resp
        .headers()
        .get(header::RETRY_AFTER)
        .expect("No retry-after header")
        .to_str()
        .expect("Invalid retry-after")
        .parse()
        .expect("Retry-after is not a number");
    assert!((1..=60).contains(&retry_after));

    // Health checks are never limited
    let resp = send(&app, Method::GET, "/health", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
