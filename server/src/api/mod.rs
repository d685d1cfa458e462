//! API Router and Application State
//!
//! Central routing configuration and shared state.

pub mod events;
pub mod messages;
pub mod sessions;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pairing::SessionChannels;
use crate::streams::producer::StreamProducer;
use crate::webhooks::registry::PgWebhookRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Webhook/session registry
    pub registry: Arc<PgWebhookRegistry>,
    /// Command stream publisher
    pub producer: StreamProducer,
    /// Pairing channel registry
    pub channels: Arc<SessionChannels>,
    /// Outbound HTTP client (test deliveries)
    pub http: reqwest::Client,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        registry: Arc<PgWebhookRegistry>,
        producer: StreamProducer,
        channels: Arc<SessionChannels>,
        http: reqwest::Client,
        config: Config,
    ) -> Self {
        Self {
            registry,
            producer,
            channels,
            http,
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/events", get(events::list_events))
        .route("/v1/messages/text", post(messages::send_text))
        .route("/v1/messages/image", post(messages::send_image))
        .route("/v1/messages/audio", post(messages::send_audio))
        .route("/v1/messages/video", post(messages::send_video))
        .route("/v1/sessions", post(sessions::create_session))
        .route("/v1/sessions/{session_id}", delete(sessions::logout_session))
        .route(
            "/v1/sessions/{session_id}/stream",
            get(sessions::stream_session_events),
        )
        .route("/v1/webhooks/{webhook_id}/test", post(webhooks::test_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
