//! Webhook Registry Access
//!
//! The narrow interface the relay depends on: resolve a session's owner,
//! fetch matching subscriptions, and record delivery bookkeeping. The
//! registry rows themselves are created and managed by the (external)
//! registry API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::events::EventKind;
use super::types::Webhook;

/// Registry access errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read/bookkeeping operations the relay needs from the subscription store.
#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    /// Resolve the owning user of a session. Unknown sessions return `None`.
    async fn find_owner(&self, session_id: Uuid) -> Result<Option<Uuid>, RegistryError>;

    /// All enabled subscriptions of `owner_id` whose subscribed set contains
    /// `event`. Session scoping is applied by the caller.
    async fn find_subscriptions(
        &self,
        owner_id: Uuid,
        event: EventKind,
    ) -> Result<Vec<Webhook>, RegistryError>;

    /// Reset the failure counter and stamp the last successful delivery.
    async fn record_success(&self, webhook_id: Uuid, at: DateTime<Utc>) -> Result<(), RegistryError>;

    /// Bump the failure counter after an exhausted retry sequence.
    async fn record_failure(&self, webhook_id: Uuid) -> Result<(), RegistryError>;
}

/// `PostgreSQL`-backed registry.
pub struct PgWebhookRegistry {
    pool: PgPool,
}

impl PgWebhookRegistry {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full webhook row including its secret, for the test-delivery facility.
    pub async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>, RegistryError> {
        let webhook = sqlx::query_as::<_, Webhook>(
            r"
            SELECT id, user_id, url, secret, session_id, events, enabled,
                   last_triggered_at, failure_count, created_at
            FROM webhooks
            WHERE id = $1
            ",
        )
        .bind(webhook_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    /// Insert a session row owned by `user_id` (pairing kickoff).
    pub async fn insert_session(&self, session_id: Uuid, user_id: Uuid) -> Result<(), RegistryError> {
        sqlx::query("INSERT INTO sessions (id, user_id, status) VALUES ($1, $2, 'pending')")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl WebhookRegistry for PgWebhookRegistry {
    async fn find_owner(&self, session_id: Uuid) -> Result<Option<Uuid>, RegistryError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(user_id,)| user_id))
    }

    async fn find_subscriptions(
        &self,
        owner_id: Uuid,
        event: EventKind,
    ) -> Result<Vec<Webhook>, RegistryError> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            r"
            SELECT id, user_id, url, secret, session_id, events, enabled,
                   last_triggered_at, failure_count, created_at
            FROM webhooks
            WHERE user_id = $1
              AND enabled = true
              AND $2 = ANY(events)
            ",
        )
        .bind(owner_id)
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(webhooks)
    }

    async fn record_success(&self, webhook_id: Uuid, at: DateTime<Utc>) -> Result<(), RegistryError> {
        // The row may have been deleted mid-flight; zero rows affected is fine.
        sqlx::query("UPDATE webhooks SET failure_count = 0, last_triggered_at = $2 WHERE id = $1")
            .bind(webhook_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_failure(&self, webhook_id: Uuid) -> Result<(), RegistryError> {
        // Increment server-side so concurrent deliveries never lose a bump.
        sqlx::query("UPDATE webhooks SET failure_count = failure_count + 1 WHERE id = $1")
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory registry for unit tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::webhooks::signing;

    #[derive(Default)]
    pub struct MemoryRegistry {
        pub owners: Mutex<HashMap<Uuid, Uuid>>,
        pub webhooks: Mutex<Vec<Webhook>>,
    }

    impl MemoryRegistry {
        pub fn with_session(self, session_id: Uuid, owner_id: Uuid) -> Self {
            self.owners.lock().unwrap().insert(session_id, owner_id);
            self
        }

        pub fn with_webhook(self, webhook: Webhook) -> Self {
            self.webhooks.lock().unwrap().push(webhook);
            self
        }

        pub fn webhook(&self, webhook_id: Uuid) -> Option<Webhook> {
            self.webhooks
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.id == webhook_id)
                .cloned()
        }
    }

    /// Build a webhook row for tests.
    pub fn make_webhook(
        owner_id: Uuid,
        url: &str,
        events: &[EventKind],
        session_filter: Option<Uuid>,
    ) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            user_id: owner_id,
            url: url.to_string(),
            secret: signing::generate_secret(),
            session_id: session_filter,
            events: events.iter().map(|e| e.as_str().to_string()).collect(),
            enabled: true,
            last_triggered_at: None,
            failure_count: 0,
            created_at: Utc::now(),
        }
    }

    #[async_trait]
    impl WebhookRegistry for MemoryRegistry {
        async fn find_owner(&self, session_id: Uuid) -> Result<Option<Uuid>, RegistryError> {
            Ok(self.owners.lock().unwrap().get(&session_id).copied())
        }

        async fn find_subscriptions(
            &self,
            owner_id: Uuid,
            event: EventKind,
        ) -> Result<Vec<Webhook>, RegistryError> {
            Ok(self
                .webhooks
                .lock()
                .unwrap()
                .iter()
                .filter(|w| {
                    w.user_id == owner_id
                        && w.enabled
                        && w.events.iter().any(|e| e == event.as_str())
                })
                .cloned()
                .collect())
        }

        async fn record_success(
            &self,
            webhook_id: Uuid,
            at: DateTime<Utc>,
        ) -> Result<(), RegistryError> {
            for webhook in self.webhooks.lock().unwrap().iter_mut() {
                if webhook.id == webhook_id {
                    webhook.failure_count = 0;
                    webhook.last_triggered_at = Some(at);
                }
            }
            Ok(())
        }

        async fn record_failure(&self, webhook_id: Uuid) -> Result<(), RegistryError> {
            for webhook in self.webhooks.lock().unwrap().iter_mut() {
                if webhook.id == webhook_id {
                    webhook.failure_count += 1;
                }
            }
            Ok(())
        }
    }
}
