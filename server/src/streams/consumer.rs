//! Event Stream Consumer
//!
//! One long-lived consumer-group reader per process over the engine's event
//! stream. Entries are acknowledged only after every matched webhook delivery
//! has been attempted; undecodable entries are logged and acknowledged
//! without retry. A periodic reclaim pass picks up entries left pending by a
//! crashed group member.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fred::interfaces::StreamsInterface;
use fred::prelude::*;
use fred::types::streams::XReadResponse;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::envelope::Envelope;
use super::EVENT_STREAM;
use crate::webhooks::delivery::RetryPolicy;
use crate::webhooks::dispatch;
use crate::webhooks::events::EventKind;
use crate::webhooks::registry::WebhookRegistry;

/// Entries fetched per blocking read.
const READ_BATCH_SIZE: u64 = 10;

/// Blocking read timeout in milliseconds.
const READ_BLOCK_MS: u64 = 1_000;

/// Pause after a transient consumer error.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// How often to look for stale pending entries.
const RECLAIM_INTERVAL: Duration = Duration::from_secs(30);

/// Pending entries idle longer than this are claimed from dead consumers.
const RECLAIM_MIN_IDLE_MS: u64 = 60_000;

/// Consumer-group reader that routes engine events to webhook deliveries.
pub struct EventConsumer {
    redis: Client,
    registry: Arc<dyn WebhookRegistry>,
    http: reqwest::Client,
    policy: RetryPolicy,
    group: String,
    consumer: String,
}

impl EventConsumer {
    #[must_use]
    pub fn new(
        redis: Client,
        registry: Arc<dyn WebhookRegistry>,
        http: reqwest::Client,
        policy: RetryPolicy,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            registry,
            http,
            policy,
            group: group.into(),
            consumer: consumer.into(),
        }
    }

    /// Run the consume loop until `shutdown` fires. The loop survives all
    /// transient errors; a cancelled shutdown token is the only exit.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                result = self.ensure_group() => match result {
                    Ok(()) => break,
                    Err(e) => {
                        error!("Failed to create consumer group: {}", e);
                        tokio::time::sleep(ERROR_PAUSE).await;
                    }
                }
            }
        }

        info!(
            group = %self.group,
            consumer = %self.consumer,
            "Event consumer started"
        );

        let mut last_reclaim = Instant::now();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if last_reclaim.elapsed() >= RECLAIM_INTERVAL {
                last_reclaim = Instant::now();
                if let Err(e) = self.reclaim_stale().await {
                    warn!("Failed to reclaim stale pending entries: {}", e);
                }
            }

            let batch = tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.read_batch() => result,
            };

            match batch {
                Ok(entries) => {
                    // Ack strictly after the entry's deliveries have been
                    // attempted, whatever their outcome.
                    for (entry_id, fields) in entries {
                        self.process_entry(&entry_id, fields).await;
                        self.ack(&entry_id).await;
                    }
                }
                Err(e) => {
                    error!("Error consuming events: {}", e);
                    tokio::time::sleep(ERROR_PAUSE).await;
                }
            }
        }

        info!("Event consumer stopped");
    }

    /// Create the consumer group if it does not exist. BUSYGROUP means
    /// another instance won the race and counts as success.
    async fn ensure_group(&self) -> Result<(), Error> {
        let created: Result<(), Error> = self
            .redis
            .xgroup_create(EVENT_STREAM, self.group.as_str(), "0", true)
            .await;

        match created {
            Ok(()) => {
                info!(group = %self.group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Blocking batch fetch of unclaimed entries for this consumer.
    async fn read_batch(&self) -> Result<Vec<(String, HashMap<String, String>)>, Error> {
        let response: XReadResponse<String, String, String, String> = self
            .redis
            .xreadgroup_map(
                self.group.as_str(),
                self.consumer.as_str(),
                Some(READ_BATCH_SIZE),
                Some(READ_BLOCK_MS),
                false,
                EVENT_STREAM,
                ">",
            )
            .await?;

        Ok(response
            .into_iter()
            .flat_map(|(_stream, entries)| entries)
            .collect())
    }

    /// Claim entries a dead group member left pending and process them like
    /// fresh reads.
    async fn reclaim_stale(&self) -> Result<usize, Error> {
        let (_cursor, entries): (String, Vec<(String, HashMap<String, String>)>) = self
            .redis
            .xautoclaim_values(
                EVENT_STREAM,
                self.group.as_str(),
                self.consumer.as_str(),
                RECLAIM_MIN_IDLE_MS,
                "0-0",
                Some(READ_BATCH_SIZE),
                false,
            )
            .await?;

        let count = entries.len();
        if count > 0 {
            info!(count, "Reclaimed stale pending entries");
            for (entry_id, fields) in entries {
                self.process_entry(&entry_id, fields).await;
                self.ack(&entry_id).await;
            }
        }
        Ok(count)
    }

    /// Decode one entry and fan its event out to matched webhooks.
    ///
    /// Entries that cannot be routed (missing data field, malformed envelope,
    /// no session id, unknown event type) are logged and dropped; the caller
    /// acknowledges them regardless.
    async fn process_entry(&self, entry_id: &str, fields: HashMap<String, String>) {
        let Some(data) = fields.get("data") else {
            warn!(entry_id, "Stream entry missing data field, skipping");
            return;
        };

        let envelope = match Envelope::decode(data.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(entry_id, error = %e, "Undecodable event envelope, skipping");
                return;
            }
        };

        let Some(session_id) = envelope.session_id() else {
            debug!(entry_id, kind = %envelope.kind, "Event carries no session id, nothing to route");
            return;
        };

        let Some(event) = EventKind::parse_str(&envelope.kind) else {
            debug!(entry_id, kind = %envelope.kind, "Unknown event type, no subscribers");
            return;
        };

        let attempted = dispatch::dispatch_event(
            Arc::clone(&self.registry),
            self.http.clone(),
            self.policy.clone(),
            session_id,
            event,
            envelope,
        )
        .await;

        if attempted > 0 {
            debug!(entry_id, attempted, event = %event, "Event dispatched");
        }
    }

    /// Acknowledge one entry in the consumer group.
    async fn ack(&self, entry_id: &str) {
        let acked: Result<i64, Error> = self
            .redis
            .xack(EVENT_STREAM, self.group.as_str(), entry_id)
            .await;

        if let Err(e) = acked {
            error!(entry_id, "Failed to acknowledge event: {}", e);
        }
    }
}
