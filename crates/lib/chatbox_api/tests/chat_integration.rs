//! Integration tests: build the router around recording fakes and drive
//! `/api/chat` end to end without network or database.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chatbox_api::config::ApiConfig;
use chatbox_api::{AppState, router};
use chatbox_core::ai::{AiError, FALLBACK_REPLY, GeneratedContent, TextGenerator};
use chatbox_core::media::{BlobStore, MediaError};
use chatbox_core::models::{ChatRecord, ContentPart, NewChatRecord};
use chatbox_core::pipeline::ChatPipeline;
use chatbox_core::ratelimit::{RateLimitConfig, RateLimiter};
use chatbox_core::store::memory::MemoryChatStore;
use chatbox_core::store::{ChatStore, StoreError};
use chatbox_core::validation::ValidationPolicy;
use tower::ServiceExt;

const BOUNDARY: &str = "chatbox-test-boundary";

/// Generator returning a canned reply and recording every call.
struct StubGenerator {
    reply: Result<Option<&'static str>, ()>,
    calls: Mutex<Vec<Vec<ContentPart>>>,
}

impl StubGenerator {
    fn replying(text: &'static str) -> Arc<Self> {
        Self::with(Ok(Some(text)))
    }

    fn with(reply: Result<Option<&'static str>, ()>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, parts: &[ContentPart]) -> Result<GeneratedContent, AiError> {
        self.calls.lock().unwrap().push(parts.to_vec());
        match self.reply {
            Ok(text) => Ok(GeneratedContent::new(text.map(str::to_string))),
            Err(()) => Err(AiError::Http("connection refused".into())),
        }
    }
}

/// Blob store that remembers uploads and serves predictable URLs.
#[derive(Default)]
struct RecordingBlobStore {
    uploads: Mutex<Vec<(String, Bytes, String)>>,
    published: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn upload(&self, key: &str, bytes: Bytes, mime_type: &str) -> Result<(), MediaError> {
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), bytes, mime_type.to_string()));
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<(), MediaError> {
        self.published.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.example/chat-images/{key}")
    }
}

/// Blob store whose uploads always fail.
struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn upload(&self, _key: &str, _bytes: Bytes, _mime_type: &str) -> Result<(), MediaError> {
        Err(MediaError::Status {
            status: 503,
            body: "backend unavailable".into(),
        })
    }

    async fn make_public(&self, _key: &str) -> Result<(), MediaError> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.example/chat-images/{key}")
    }
}

/// Store whose every call fails.
struct BrokenStore;

#[async_trait]
impl ChatStore for BrokenStore {
    async fn append(&self, _record: NewChatRecord) -> Result<ChatRecord, StoreError> {
        Err(StoreError::Timeout)
    }

    async fn list_all(&self) -> Result<Vec<ChatRecord>, StoreError> {
        Err(StoreError::Timeout)
    }
}

struct Harness {
    app: axum::Router,
    generator: Arc<StubGenerator>,
    blobs: Arc<RecordingBlobStore>,
    store: Arc<MemoryChatStore>,
}

fn harness_with(
    generator: Arc<StubGenerator>,
    policy: ValidationPolicy,
    rate_limit: Option<RateLimitConfig>,
) -> Harness {
    let blobs = Arc::new(RecordingBlobStore::default());
    let store = Arc::new(MemoryChatStore::new());
    let pipeline = ChatPipeline::new(generator.clone(), store.clone())
        .with_blob_store(blobs.clone())
        .with_policy(policy);
    let state = AppState {
        pipeline,
        rate_limiter: rate_limit.map(|c| Arc::new(RateLimiter::new(c))),
        config: ApiConfig::default(),
    };
    Harness {
        app: router(state),
        generator,
        blobs,
        store,
    }
}

fn harness(generator: Arc<StubGenerator>) -> Harness {
    harness_with(generator, ValidationPolicy::strict(500), None)
}

fn from_peer(mut req: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

fn post_json(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_multipart(message: Option<&str>, image: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(message) = message {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{message}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, mime, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_chat() -> Request<Body> {
    Request::builder()
        .uri("/api/chat")
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &axum::Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("request")
}

async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

#[tokio::test]
async fn ai_reply_is_returned_and_stored_verbatim() {
    let h = harness(StubGenerator::replying("hi there\n"));

    let resp = send(&h.app, post_json(serde_json::json!({"message": "hello"}))).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["aiReply"], "hi there\n");
    let rows = h.store.list_all().await.unwrap();
    assert_eq!(rows[0].ai_reply, "hi there\n");
}

#[tokio::test]
async fn post_hello_returns_stored_exchange() {
    let h = harness(StubGenerator::replying("hi there"));

    let resp = send(&h.app, post_json(serde_json::json!({"message": "hello"}))).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert!(!json["id"].as_str().expect("id is string").is_empty());
    assert_eq!(json["userMessage"], "hello");
    assert_eq!(json["aiReply"], "hi there");
    assert!(json.get("image").is_none());
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn empty_message_is_rejected_without_downstream_calls() {
    let h = harness(StubGenerator::replying("unused"));

    let resp = send(&h.app, post_json(serde_json::json!({"message": ""}))).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "validation_error");
    assert!(json["aiReply"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(h.generator.calls(), 0);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn missing_message_field_is_rejected() {
    let h = harness(StubGenerator::replying("unused"));

    let resp = send(&h.app, post_json(serde_json::json!({}))).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    let h = harness(StubGenerator::replying("unused"));
    let long = "a".repeat(501);

    let resp = send(&h.app, post_json(serde_json::json!({"message": long}))).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.generator.calls(), 0);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn ai_failure_returns_502_and_persists_nothing() {
    let h = harness(StubGenerator::with(Err(())));

    let resp = send(&h.app, post_json(serde_json::json!({"message": "hello"}))).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "ai_unavailable");
    assert!(!json.to_string().contains("connection refused"));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn empty_ai_reply_stores_fallback() {
    let h = harness(StubGenerator::with(Ok(None)));

    let resp = send(&h.app, post_json(serde_json::json!({"message": "hello"}))).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["aiReply"], FALLBACK_REPLY);
    let rows = h.store.list_all().await.unwrap();
    assert_eq!(rows[0].ai_reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn multipart_image_is_uploaded_and_linked() {
    let h = harness(StubGenerator::replying("a cat"));
    let pixels: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    let resp = send(
        &h.app,
        post_multipart(Some("what is this?"), Some(("cat.png", "image/png", pixels))),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;

    let uploads = h.blobs.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (key, bytes, mime) = &uploads[0];
    assert_eq!(bytes.as_ref(), pixels);
    assert_eq!(mime, "image/png");
    assert!(key.ends_with("-cat.png"));
    assert_eq!(h.blobs.published.lock().unwrap().as_slice(), [key.clone()]);

    let expected_url = format!("https://storage.example/chat-images/{key}");
    assert_eq!(json["image"], expected_url.as_str());
    assert_eq!(json["userMessage"], "what is this?");

    let rows = h.store.list_all().await.unwrap();
    assert_eq!(rows[0].image.as_deref(), Some(expected_url.as_str()));

    let calls = h.generator.calls.lock().unwrap();
    assert_eq!(calls[0].len(), 2);
    assert!(matches!(
        &calls[0][1],
        ContentPart::InlineData { mime_type, data } if mime_type == "image/png" && data.as_ref() == pixels
    ));
}

#[tokio::test]
async fn image_only_accepted_under_lenient_policy() {
    let h = harness_with(
        StubGenerator::replying("nice photo"),
        ValidationPolicy::message_or_image(),
        None,
    );

    let resp = send(
        &h.app,
        post_multipart(None, Some(("photo.jpg", "image/jpeg", &b"jpegdata"[..]))),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["userMessage"], "");
    assert!(json["image"].is_string());
}

#[tokio::test]
async fn image_only_rejected_under_strict_policy() {
    let h = harness(StubGenerator::replying("unused"));

    let resp = send(
        &h.app,
        post_multipart(None, Some(("photo.jpg", "image/jpeg", &b"jpegdata"[..]))),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.blobs.uploads.lock().unwrap().is_empty());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let h = harness(StubGenerator::replying("unused"));
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();

    let resp = send(&h.app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn get_lists_records_oldest_first() {
    let h = harness(StubGenerator::replying("ok"));
    for msg in ["first", "second", "third"] {
        let resp = send(&h.app, post_json(serde_json::json!({"message": msg}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = send(&h.app, get_chat()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    let items = json.as_array().expect("array");
    let messages: Vec<_> = items
        .iter()
        .map(|r| r["userMessage"].as_str().unwrap())
        .collect();
    assert_eq!(messages, ["first", "second", "third"]);

    let times: Vec<_> = items
        .iter()
        .map(|r| chrono::DateTime::parse_from_rfc3339(r["createdAt"].as_str().unwrap()).unwrap())
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn store_failures_map_to_500() {
    let pipeline = ChatPipeline::new(StubGenerator::replying("ok"), Arc::new(BrokenStore));
    let app = router(AppState {
        pipeline,
        rate_limiter: None,
        config: ApiConfig::default(),
    });

    let resp = send(&app, post_json(serde_json::json!({"message": "hello"}))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "persistence_error");

    let resp = send(&app, get_chat()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(resp).await;
    assert_eq!(json["aiReply"], "⚠️ Failed to fetch messages.");
}

#[tokio::test]
async fn eleventh_post_in_window_is_rate_limited() {
    let h = harness_with(
        StubGenerator::replying("ok"),
        ValidationPolicy::strict(500),
        Some(RateLimitConfig::default()),
    );

    for i in 0..10 {
        let req = from_peer(
            post_json(serde_json::json!({"message": format!("msg {i}")})),
            "198.51.100.4:40000",
        );
        let resp = send(&h.app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "request {i}");
        assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
    }

    let req = from_peer(
        post_json(serde_json::json!({"message": "one too many"})),
        "198.51.100.4:40001",
    );
    let resp = send(&h.app, req).await;

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(json_body(resp).await["error"], "rate_limited");
    assert_eq!(h.generator.calls(), 10);
    assert_eq!(h.store.len().await, 10);

    // Another client still has its own window.
    let req = from_peer(
        post_json(serde_json::json!({"message": "hello"})),
        "198.51.100.5:40000",
    );
    assert_eq!(send(&h.app, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_window_rolls_over() {
    let h = harness_with(
        StubGenerator::replying("ok"),
        ValidationPolicy::strict(500),
        Some(RateLimitConfig {
            max_requests: 1,
            window: std::time::Duration::from_millis(200),
        }),
    );
    let req = || from_peer(post_json(serde_json::json!({"message": "hi"})), "192.0.2.1:1");

    assert_eq!(send(&h.app, req()).await.status(), StatusCode::OK);
    assert_eq!(send(&h.app, req()).await.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    assert_eq!(send(&h.app, req()).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_rate_limit_lets_everything_through() {
    let h = harness(StubGenerator::replying("ok"));

    for i in 0..15 {
        let req = from_peer(
            post_json(serde_json::json!({"message": format!("msg {i}")})),
            "198.51.100.4:40000",
        );
        let resp = send(&h.app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!resp.headers().contains_key("x-ratelimit-limit"));
    }
    assert_eq!(h.store.len().await, 15);
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let generator = StubGenerator::replying("unused");
    let blobs = Arc::new(RecordingBlobStore::default());
    let store = Arc::new(MemoryChatStore::new());
    let pipeline = ChatPipeline::new(generator.clone(), store.clone()).with_blob_store(blobs.clone());
    let app = router(AppState {
        pipeline,
        rate_limiter: None,
        config: ApiConfig {
            max_upload_bytes: 1024,
            ..Default::default()
        },
    });
    let pixels = vec![0xAB_u8; 4096];

    let resp = send(
        &app,
        post_multipart(Some("too big"), Some(("big.png", "image/png", &pixels[..]))),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(resp).await["error"], "payload_too_large");
    assert_eq!(generator.calls(), 0);
    assert!(blobs.uploads.lock().unwrap().is_empty());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn upload_failure_returns_502_and_persists_nothing() {
    let store = Arc::new(MemoryChatStore::new());
    let pipeline = ChatPipeline::new(StubGenerator::replying("a cat"), store.clone())
        .with_blob_store(Arc::new(FailingBlobStore));
    let app = router(AppState {
        pipeline,
        rate_limiter: None,
        config: ApiConfig::default(),
    });

    let resp = send(
        &app,
        post_multipart(Some("what is this?"), Some(("cat.png", "image/png", &b"png"[..]))),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "upload_failed");
    assert!(!json.to_string().contains("backend unavailable"));
    assert!(store.is_empty().await);
}
