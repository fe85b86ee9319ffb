//! # prattle-server
//!
//! HTTP API over a shared [`Responder`]:
//!
//! - `POST /chat` answers one message on a channel
//! - `POST /reset` forgets a channel
//! - `GET /history/{channel}` returns the persisted conversation
//! - `GET /health` and `GET /metrics`

pub mod metrics;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use prattle_config::schema::ServerConfig;
use prattle_core::{MessageRecord, PrattleError};
use prattle_runtime::{Responder, Stage};

/// Channel used when a chat request names none.
pub const DEFAULT_CHANNEL: &str = "default";

/// Shared server state.
pub struct AppState {
    pub responder: Arc<Responder>,
    pub metrics: metrics::Metrics,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
    channel: String,
    stage: Stage,
}

#[derive(Deserialize)]
struct ResetRequest {
    channel: String,
}

#[derive(Serialize)]
struct ResetResponse {
    channel: String,
    reset: bool,
}

#[derive(Serialize)]
struct HistoryResponse {
    channel: String,
    messages: Vec<MessageRecord>,
}

/// An error answered with a status code and a JSON `{"error": ...}` body.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PrattleError> for ApiError {
    fn from(e: PrattleError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Build the Axum router.
pub fn build_router(responder: Arc<Responder>, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState {
        responder,
        metrics: metrics::Metrics::new(),
    });

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/chat", post(chat_handler))
        .route("/reset", post(reset_handler))
        .route("/history/{channel}", get(history_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

fn channel_or_default(channel: Option<String>) -> Result<String, ApiError> {
    match channel {
        None => Ok(DEFAULT_CHANNEL.to_string()),
        Some(c) if c.trim().is_empty() => Err(ApiError::bad_request("channel must not be empty")),
        Some(c) => Ok(c),
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    state.metrics.inc_http_requests();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.metrics.uptime_secs(),
    })
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render_prometheus(),
    )
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    state.metrics.inc_http_requests();
    if req.message.trim().is_empty() {
        state.metrics.inc_http_errors();
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let channel = channel_or_default(req.channel).inspect_err(|_| state.metrics.inc_http_errors())?;

    let reply = state
        .responder
        .respond(&channel, &req.message, req.user_id.as_deref())
        .await;
    state.metrics.record_reply(reply.stage);

    Ok(Json(ChatResponse {
        reply: reply.text,
        channel,
        stage: reply.stage,
    }))
}

async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.metrics.inc_http_requests();
    let channel = channel_or_default(Some(req.channel)).inspect_err(|_| state.metrics.inc_http_errors())?;

    if let Err(e) = state.responder.reset(&channel).await {
        warn!(channel = %channel, error = %e, "reset failed");
        state.metrics.inc_http_errors();
        return Err(e.into());
    }
    state.metrics.inc_resets();
    Ok(Json(ResetResponse {
        channel,
        reset: true,
    }))
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    state.metrics.inc_http_requests();
    let messages = state.responder.history(&channel).await.inspect_err(|e| {
        warn!(channel = %channel, error = %e, "history unavailable");
        state.metrics.inc_http_errors();
    })?;
    Ok(Json(HistoryResponse { channel, messages }))
}

/// Bind `config.listen` and serve until Ctrl-C.
pub async fn start_server(responder: Arc<Responder>, config: &ServerConfig) -> prattle_core::Result<()> {
    let router = build_router(responder, config);
    let listen = config.listen.clone();

    info!(listen = %listen, cors = config.cors, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| PrattleError::Server(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PrattleError::Server(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
