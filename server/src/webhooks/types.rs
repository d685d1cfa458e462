//! Webhook Types
//!
//! Data structures for subscriptions and delivery outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered webhook subscription.
///
/// Owned by the registry API; this core only mutates `last_triggered_at` and
/// `failure_count` through delivery bookkeeping.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Scope to one session; `None` means all of the owner's sessions.
    pub session_id: Option<Uuid>,
    pub events: Vec<String>,
    pub enabled: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub failure_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Final outcome of one event/webhook delivery cycle. Ephemeral; only the
/// aggregate counters on the subscription survive.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub attempts: u32,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Result of a single synchronous test delivery.
#[derive(Debug, Serialize)]
pub struct TestDeliveryResult {
    pub success: bool,
    pub response_status: Option<u16>,
    pub latency_ms: u64,
    pub error_message: Option<String>,
}
