//! HTTP API tests: every endpoint driven through `oneshot` against an
//! in-memory responder.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use prattle_config::PrattleConfig;
use prattle_config::schema::ServerConfig;
use prattle_memory::InMemoryStore;
use prattle_runtime::Responder;

fn responder() -> Arc<Responder> {
    let mut config = PrattleConfig::default();
    config.search.enabled = false;
    config.responder.rng_seed = Some(7);
    Arc::new(Responder::new(config, Arc::new(InMemoryStore::new())).unwrap())
}

fn setup() -> axum::Router {
    prattle_server::build_router(responder(), &ServerConfig::default())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Health & Metrics ───────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let resp = setup()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_count_replies_by_stage() {
    let app = setup();
    let resp = app
        .clone()
        .oneshot(post_json("/chat", serde_json::json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let body = body_string(resp).await;
    assert!(body.contains("prattle_chat_messages_total 1"));
    assert!(body.contains(r#"prattle_replies_total{stage="topic"} 1"#));
}

// ── Chat ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_defaults_channel() {
    let resp = setup()
        .oneshot(post_json("/chat", serde_json::json!({"message": "hello"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["channel"], prattle_server::DEFAULT_CHANNEL);
    assert_eq!(json["stage"], "topic");
    assert!(!json["reply"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_faq_on_named_channel() {
    let resp = setup()
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "who is your creator?", "channel": "room-1", "user_id": "u1"}),
        ))
        .await
        .unwrap();

    let json = body_json(resp).await;
    assert_eq!(json["channel"], "room-1");
    assert_eq!(json["stage"], "faq");
    assert_eq!(json["reply"], PrattleConfig::default().lexicon.faq[0].response);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let resp = setup()
        .oneshot(post_json("/chat", serde_json::json!({"message": "   "})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("message"));
}

#[tokio::test]
async fn test_chat_rejects_blank_channel() {
    let resp = setup()
        .oneshot(post_json("/chat", serde_json::json!({"message": "hi", "channel": ""})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_malformed_body() {
    let req = Request::post("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = setup().oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
}

// ── History & Reset ────────────────────────────────────────────

#[tokio::test]
async fn test_history_after_chat() {
    let app = setup();
    app.clone()
        .oneshot(post_json("/chat", serde_json::json!({"message": "Paris is beautiful", "channel": "c1"})))
        .await
        .unwrap();

    let resp = app
        .oneshot(Request::get("/history/c1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "Paris is beautiful");
    assert_eq!(messages[2]["content"], "paris is beautiful");
}

#[tokio::test]
async fn test_history_of_unknown_channel_is_empty() {
    let resp = setup()
        .oneshot(Request::get("/history/nobody").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reset_clears_channel() {
    let app = setup();
    app.clone()
        .oneshot(post_json("/chat", serde_json::json!({"message": "Paris is beautiful", "channel": "c1"})))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(post_json("/reset", serde_json::json!({"channel": "c1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["reset"], true);

    let resp = app
        .clone()
        .oneshot(Request::get("/history/c1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(resp).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "system");

    // Knowledge is gone too
    let resp = app
        .oneshot(post_json("/chat", serde_json::json!({"message": "tell me about paris", "channel": "c1"})))
        .await
        .unwrap();
    assert_ne!(body_json(resp).await["stage"], "knowledge");
}

// ── CORS ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_cors_headers_when_enabled() {
    let req = Request::get("/health")
        .header("origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let resp = setup().oneshot(req).await.unwrap();
    assert!(resp.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_no_cors_headers_when_disabled() {
    let config = ServerConfig {
        cors: false,
        ..ServerConfig::default()
    };
    let app = prattle_server::build_router(responder(), &config);
    let req = Request::get("/health")
        .header("origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert!(!resp.headers().contains_key("access-control-allow-origin"));
}
