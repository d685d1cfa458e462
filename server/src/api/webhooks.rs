//! Webhook Test Delivery Endpoint
//!
//! On-demand single delivery attempt that surfaces the raw HTTP outcome
//! synchronously, so webhook owners can debug their receivers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, instrument};
use uuid::Uuid;

use super::AppState;
use crate::webhooks::delivery;
use crate::webhooks::types::TestDeliveryResult;

/// POST /v1/webhooks/{webhook_id}/test
#[instrument(skip(state))]
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<Uuid>,
) -> Result<Json<TestDeliveryResult>, (StatusCode, String)> {
    let webhook = state
        .registry
        .find_webhook(webhook_id)
        .await
        .map_err(|e| {
            error!(webhook_id = %webhook_id, "Failed to look up webhook: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to look up webhook".to_string(),
            )
        })?
        .ok_or((StatusCode::NOT_FOUND, "Webhook not found".to_string()))?;

    let result = delivery::test_delivery(&state.http, &webhook).await;
    Ok(Json(result))
}
