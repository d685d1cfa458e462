//! Message Send Endpoints
//!
//! Thin handlers that validate a send request and queue the corresponding
//! command for the engine. Actual sending happens engine-side; a 202 here
//! only means the command reached the stream.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, instrument};
use uuid::Uuid;

use super::AppState;
use crate::streams::CommandKind;

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub session_id: Uuid,
    /// Recipient phone number in WhatsApp format
    pub to: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendImageRequest {
    pub session_id: Uuid,
    pub to: String,
    pub image_url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendAudioRequest {
    pub session_id: Uuid,
    pub to: String,
    pub audio_url: String,
    /// Send as a push-to-talk voice note
    #[serde(default)]
    pub ptt: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendVideoRequest {
    pub session_id: Uuid,
    pub to: String,
    pub video_url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandQueuedResponse {
    pub status: &'static str,
    /// Stream-assigned position of the queued command
    pub position: String,
}

/// POST /v1/messages/text
#[instrument(skip(state, request))]
pub async fn send_text(
    State(state): State<AppState>,
    Json(request): Json<SendTextRequest>,
) -> Result<(StatusCode, Json<CommandQueuedResponse>), (StatusCode, String)> {
    let payload = json!({
        "session_id": request.session_id,
        "to": request.to,
        "message": request.message,
    });
    queue_command(&state, CommandKind::SendText, payload).await
}

/// POST /v1/messages/image
#[instrument(skip(state, request))]
pub async fn send_image(
    State(state): State<AppState>,
    Json(request): Json<SendImageRequest>,
) -> Result<(StatusCode, Json<CommandQueuedResponse>), (StatusCode, String)> {
    let payload = json!({
        "session_id": request.session_id,
        "to": request.to,
        "image_url": request.image_url,
        "caption": request.caption,
    });
    queue_command(&state, CommandKind::SendImage, payload).await
}

/// POST /v1/messages/audio
#[instrument(skip(state, request))]
pub async fn send_audio(
    State(state): State<AppState>,
    Json(request): Json<SendAudioRequest>,
) -> Result<(StatusCode, Json<CommandQueuedResponse>), (StatusCode, String)> {
    let payload = json!({
        "session_id": request.session_id,
        "to": request.to,
        "audio_url": request.audio_url,
        "ptt": request.ptt,
    });
    queue_command(&state, CommandKind::SendAudio, payload).await
}

/// POST /v1/messages/video
#[instrument(skip(state, request))]
pub async fn send_video(
    State(state): State<AppState>,
    Json(request): Json<SendVideoRequest>,
) -> Result<(StatusCode, Json<CommandQueuedResponse>), (StatusCode, String)> {
    let payload = json!({
        "session_id": request.session_id,
        "to": request.to,
        "video_url": request.video_url,
        "caption": request.caption,
    });
    queue_command(&state, CommandKind::SendVideo, payload).await
}

/// Publish failures are hard errors back to the caller; the command is never
/// silently dropped.
async fn queue_command(
    state: &AppState,
    kind: CommandKind,
    payload: serde_json::Value,
) -> Result<(StatusCode, Json<CommandQueuedResponse>), (StatusCode, String)> {
    match state.producer.publish_command(kind, payload).await {
        Ok(position) => Ok((
            StatusCode::ACCEPTED,
            Json(CommandQueuedResponse {
                status: "queued",
                position,
            }),
        )),
        Err(e) => {
            error!(command = %kind, "Failed to queue command: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                format!("Failed to queue command: {e}"),
            ))
        }
    }
}
