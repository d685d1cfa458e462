//! Webhook Delivery Worker
//!
//! Signs and posts one event to one subscriber endpoint with bounded
//! retries, then records the outcome on the subscription. Each delivery runs
//! as its own task; a slow subscriber never blocks the consumer loop or
//! other subscribers.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::events::EventKind;
use super::registry::WebhookRegistry;
use super::signing;
use super::types::{DeliveryOutcome, TestDeliveryResult, Webhook};
use crate::streams::envelope::Envelope;

/// Fixed User-Agent sent with every delivery.
pub const USER_AGENT: &str = "WaRelay-Webhook/1.0";

/// Per-attempt HTTP timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry schedule for subscriber deliveries.
///
/// The delay table has a spare slot past the attempt budget so raising
/// `max_attempts` needs no further change.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(30),
            ],
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) fails, or `None` once the
    /// attempt budget is spent.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        self.delays
            .get(attempt as usize - 1)
            .copied()
            .or_else(|| self.delays.last().copied())
    }
}

/// Signed request material for one outward delivery.
///
/// Computed once per delivery; retries resend the identical body and
/// signature.
#[derive(Debug, Clone)]
pub struct SignedEvent {
    pub body: String,
    pub signature: String,
    pub timestamp: i64,
}

/// Build the outward payload and its signature.
///
/// The body is `{id, type, timestamp, data}` with a display-prefixed event
/// id; internal envelope metadata is not leaked verbatim.
pub fn sign_event(secret: &str, event_type: &str, event_id: Uuid, data: &Value) -> SignedEvent {
    let now = Utc::now();
    let body = json!({
        "id": format!("evt_{event_id}"),
        "type": event_type,
        "timestamp": now.to_rfc3339(),
        "data": data,
    })
    .to_string();

    let timestamp = now.timestamp();
    let signature = signing::sign_payload(secret, timestamp, &body);

    SignedEvent {
        body,
        signature,
        timestamp,
    }
}

/// Send one signed POST. Returns the response status (if any reply arrived),
/// the attempt latency, and the transport error message on failure.
async fn send_once(
    http: &reqwest::Client,
    url: &str,
    signed: &SignedEvent,
) -> (Option<u16>, u64, Option<String>) {
    let start = std::time::Instant::now();
    let result = http
        .post(url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", format!("sha256={}", signed.signature))
        .header("X-Webhook-Timestamp", signed.timestamp.to_string())
        .header("User-Agent", USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .body(signed.body.clone())
        .send()
        .await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) => (Some(response.status().as_u16()), latency_ms, None),
        Err(e) => (None, latency_ms, Some(e.to_string())),
    }
}

fn is_success(status: Option<u16>) -> bool {
    status.is_some_and(|s| (200..300).contains(&s))
}

/// Deliver one event to one webhook with retries and bookkeeping.
///
/// Success resets `failure_count` and stamps `last_triggered_at`; an
/// exhausted retry sequence bumps `failure_count` by one. Both bookkeeping
/// writes tolerate the subscription having disappeared mid-flight.
pub async fn deliver(
    registry: &dyn WebhookRegistry,
    http: &reqwest::Client,
    policy: &RetryPolicy,
    webhook: &Webhook,
    event: EventKind,
    envelope: &Envelope,
) -> DeliveryOutcome {
    let signed = sign_event(&webhook.secret, event.as_str(), envelope.id, &envelope.payload);

    let mut attempt = 0u32;
    let mut last_status = None;
    let mut last_error = None;
    let mut latency_ms = 0;

    while attempt < policy.max_attempts {
        attempt += 1;
        let (status, latency, transport_error) = send_once(http, &webhook.url, &signed).await;
        last_status = status;
        last_error = transport_error;
        latency_ms = latency;

        if is_success(status) {
            info!(
                webhook_id = %webhook.id,
                event = %event,
                attempt,
                latency_ms,
                "Webhook delivered"
            );
            if let Err(e) = registry.record_success(webhook.id, Utc::now()).await {
                error!(webhook_id = %webhook.id, "Failed to record delivery success: {}", e);
            }
            return DeliveryOutcome {
                success: true,
                status,
                attempts: attempt,
                latency_ms,
                error: None,
            };
        }

        match (status, &last_error) {
            (Some(code), _) => warn!(
                webhook_id = %webhook.id,
                event = %event,
                attempt,
                "Webhook returned HTTP {}", code
            ),
            (None, Some(e)) => warn!(
                webhook_id = %webhook.id,
                event = %event,
                attempt,
                "Webhook attempt failed: {}", e
            ),
            (None, None) => {}
        }

        if let Some(delay) = policy.delay_after(attempt) {
            tokio::time::sleep(delay).await;
        }
    }

    error!(
        webhook_id = %webhook.id,
        event = %event,
        attempts = attempt,
        "Webhook delivery exhausted all retries"
    );
    if let Err(e) = registry.record_failure(webhook.id).await {
        error!(webhook_id = %webhook.id, "Failed to record delivery failure: {}", e);
    }

    DeliveryOutcome {
        success: false,
        status: last_status,
        attempts: attempt,
        latency_ms,
        error: last_error,
    }
}

/// One synchronous delivery attempt with a synthetic payload. No retries, no
/// bookkeeping; the raw HTTP outcome goes back to the caller.
pub async fn test_delivery(http: &reqwest::Client, webhook: &Webhook) -> TestDeliveryResult {
    let signed = sign_event(
        &webhook.secret,
        "webhook.test",
        Uuid::new_v4(),
        &json!({"test": true}),
    );
    let (status, latency_ms, transport_error) = send_once(http, &webhook.url, &signed).await;
    let success = is_success(status);

    TestDeliveryResult {
        success,
        response_status: status,
        latency_ms,
        error_message: if success {
            None
        } else {
            transport_error.or_else(|| status.map(|s| format!("HTTP {s}")))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::registry::testing::{make_webhook, MemoryRegistry};
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delays: vec![Duration::from_millis(5), Duration::from_millis(5)],
        }
    }

    #[test]
    fn default_policy_matches_observed_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(5)));
        // No delay after the final attempt
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn signed_event_is_verifiable() {
        let secret = "whsec_abc";
        let signed = sign_event(secret, "message.sent", Uuid::new_v4(), &json!({"k": "v"}));
        assert!(signing::verify_signature(
            secret,
            signed.timestamp,
            &signed.body,
            &signed.signature
        ));
        assert!(signed.body.contains("\"type\":\"message.sent\""));
        assert!(signed.body.contains("\"id\":\"evt_"));
    }

    #[tokio::test]
    async fn success_resets_counters_and_stamps_trigger_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .and(header_exists("x-webhook-signature"))
            .and(header_exists("x-webhook-timestamp"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let owner = Uuid::new_v4();
        let mut webhook = make_webhook(
            owner,
            &format!("{}/hook", server.uri()),
            &[EventKind::MessageSent],
            None,
        );
        webhook.failure_count = 4;
        let webhook_id = webhook.id;
        let registry = MemoryRegistry::default().with_webhook(webhook.clone());

        let envelope = Envelope::new("message.sent", json!({"session_id": "s"}));
        let outcome = deliver(
            &registry,
            &reqwest::Client::new(),
            &fast_policy(),
            &webhook,
            EventKind::MessageSent,
            &envelope,
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, Some(200));

        let stored = registry.webhook(webhook_id).unwrap();
        assert_eq!(stored.failure_count, 0);
        assert!(stored.last_triggered_at.is_some());
    }

    #[tokio::test]
    async fn exhausted_retries_bump_failure_count_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let owner = Uuid::new_v4();
        let webhook = make_webhook(
            owner,
            &format!("{}/hook", server.uri()),
            &[EventKind::MessageSent],
            None,
        );
        let webhook_id = webhook.id;
        let registry = MemoryRegistry::default().with_webhook(webhook.clone());

        let envelope = Envelope::new("message.sent", json!({"session_id": "s"}));
        let outcome = deliver(
            &registry,
            &reqwest::Client::new(),
            &fast_policy(),
            &webhook,
            EventKind::MessageSent,
            &envelope,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.status, Some(500));

        let stored = registry.webhook(webhook_id).unwrap();
        assert_eq!(stored.failure_count, 1);
        assert!(stored.last_triggered_at.is_none());
    }

    #[tokio::test]
    async fn transport_failure_reports_error_message() {
        // Nothing is listening on this port
        let owner = Uuid::new_v4();
        let webhook = make_webhook(
            owner,
            "http://127.0.0.1:1/hook",
            &[EventKind::MessageSent],
            None,
        );
        let registry = MemoryRegistry::default().with_webhook(webhook.clone());

        let policy = RetryPolicy {
            max_attempts: 1,
            delays: vec![],
        };
        let envelope = Envelope::new("message.sent", json!({"session_id": "s"}));
        let outcome = deliver(
            &registry,
            &reqwest::Client::new(),
            &policy,
            &webhook,
            EventKind::MessageSent,
            &envelope,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.status, None);
        assert!(outcome.error.is_some());
        assert_eq!(registry.webhook(webhook.id).unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn test_delivery_is_single_attempt_without_bookkeeping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = make_webhook(
            Uuid::new_v4(),
            &format!("{}/hook", server.uri()),
            &[EventKind::MessageSent],
            None,
        );

        let result = test_delivery(&reqwest::Client::new(), &webhook).await;
        assert!(!result.success);
        assert_eq!(result.response_status, Some(503));
        assert_eq!(result.error_message.as_deref(), Some("HTTP 503"));
    }
}
