//! Session Endpoints
//!
//! Session creation (pairing kickoff) and the live QR pairing stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::AppState;
use crate::pairing::bridge::{bridge_frames, frame_to_event};
use crate::streams::CommandKind;
use crate::webhooks::registry::WebhookRegistry;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub id: Uuid,
    pub status: &'static str,
    /// Where to open the QR pairing stream
    pub stream_url: String,
}

/// POST /v1/sessions
#[instrument(skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), (StatusCode, String)> {
    let session_id = Uuid::new_v4();

    state
        .registry
        .insert_session(session_id, request.user_id)
        .await
        .map_err(|e| {
            error!(user_id = %request.user_id, "Failed to create session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })?;

    state
        .producer
        .publish_command(
            CommandKind::InitSession,
            json!({
                "session_id": session_id,
                "user_id": request.user_id,
            }),
        )
        .await
        .map_err(|e| {
            error!(session_id = %session_id, "Failed to queue session init: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to queue session init: {e}"),
            )
        })?;

    info!(session_id = %session_id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            id: session_id,
            status: "pending",
            stream_url: format!("/v1/sessions/{session_id}/stream"),
        }),
    ))
}

/// DELETE /v1/sessions/{session_id}
///
/// Queue a logout for the session. The engine tears the connection down and
/// reports the outcome through the event stream.
#[instrument(skip(state))]
pub async fn logout_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let owner = state.registry.find_owner(session_id).await.map_err(|e| {
        error!(session_id = %session_id, "Failed to look up session: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to look up session".to_string(),
        )
    })?;

    if owner.is_none() {
        return Err((StatusCode::NOT_FOUND, "Session not found".to_string()));
    }

    state
        .producer
        .publish_command(CommandKind::Logout, json!({ "session_id": session_id }))
        .await
        .map_err(|e| {
            error!(session_id = %session_id, "Failed to queue logout: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to queue logout: {e}"),
            )
        })?;

    Ok(StatusCode::ACCEPTED)
}

/// GET /v1/sessions/{session_id}/stream
///
/// Server-Sent Events stream for QR codes and connection status.
///
/// Events:
/// - `qr`: QR code payload to render
/// - `connected`: session paired successfully (stream closes)
/// - `error`: pairing failed or timed out (stream closes)
#[instrument(skip(state))]
pub async fn stream_session_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let owner = state
        .registry
        .find_owner(session_id)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, "Failed to look up session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to look up session".to_string(),
            )
        })?;

    if owner.is_none() {
        return Err((StatusCode::NOT_FOUND, "Session not found".to_string()));
    }

    let subscription = state.channels.subscribe(session_id).await.map_err(|e| {
        error!(session_id = %session_id, "Failed to open pairing stream: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to open pairing stream".to_string(),
        )
    })?;

    info!(session_id = %session_id, "Pairing stream started");

    let (rx, guard) = subscription.into_parts();
    let stream = async_stream::stream! {
        // Held for the stream's lifetime; dropping it (terminal frame or
        // client disconnect alike) releases the channel subscription.
        let _guard = guard;
        let frames = bridge_frames(rx);
        tokio::pin!(frames);
        while let Some(frame) = frames.next().await {
            yield Ok::<Event, Infallible>(frame_to_event(frame));
        }
        info!(session_id = %session_id, "Pairing stream closed");
    };

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            // Disable proxy buffering so frames reach the client immediately
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    ))
}
