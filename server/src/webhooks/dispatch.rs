//! Webhook Event Dispatch
//!
//! Resolves which subscriptions should receive an event and fans out one
//! independent delivery task per match.

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use super::delivery::{self, RetryPolicy};
use super::events::EventKind;
use super::registry::WebhookRegistry;
use super::types::Webhook;
use crate::streams::envelope::Envelope;

/// Resolve the subscriptions that should receive `event` for `session_id`.
///
/// A webhook matches iff the session's owner owns it, it is enabled, the
/// event type is in its subscribed set, and its session filter is absent or
/// equals the session exactly. Unknown sessions and registry errors resolve
/// to an empty set.
pub async fn match_webhooks(
    registry: &dyn WebhookRegistry,
    session_id: Uuid,
    event: EventKind,
) -> Vec<Webhook> {
    let owner_id = match registry.find_owner(session_id).await {
        Ok(Some(owner_id)) => owner_id,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(
                session_id = %session_id,
                event = %event,
                error = %e,
                "Failed to resolve session owner"
            );
            return Vec::new();
        }
    };

    let subscriptions = match registry.find_subscriptions(owner_id, event).await {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            warn!(
                owner_id = %owner_id,
                event = %event,
                error = %e,
                "Failed to fetch webhook subscriptions"
            );
            return Vec::new();
        }
    };

    subscriptions
        .into_iter()
        .filter(|webhook| webhook.session_id.is_none() || webhook.session_id == Some(session_id))
        .collect()
}

/// Dispatch one event to every matched webhook and wait until each delivery
/// has been attempted. Returns the number of webhooks attempted.
pub async fn dispatch_event(
    registry: Arc<dyn WebhookRegistry>,
    http: reqwest::Client,
    policy: RetryPolicy,
    session_id: Uuid,
    event: EventKind,
    envelope: Envelope,
) -> usize {
    let matches = match_webhooks(registry.as_ref(), session_id, event).await;
    if matches.is_empty() {
        return 0;
    }

    let envelope = Arc::new(envelope);
    let mut handles = Vec::with_capacity(matches.len());

    for webhook in matches {
        let registry = Arc::clone(&registry);
        let http = http.clone();
        let policy = policy.clone();
        let envelope = Arc::clone(&envelope);
        handles.push(tokio::spawn(async move {
            delivery::deliver(registry.as_ref(), &http, &policy, &webhook, event, &envelope).await;
        }));
    }

    let attempted = handles.len();
    for handle in handles {
        if let Err(e) = handle.await {
            error!(
                session_id = %session_id,
                event = %event,
                "Delivery task panicked: {}", e
            );
        }
    }
    attempted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::registry::testing::{make_webhook, MemoryRegistry};

    #[tokio::test]
    async fn unknown_session_matches_nothing() {
        let registry = MemoryRegistry::default();
        let matches =
            match_webhooks(&registry, Uuid::new_v4(), EventKind::MessageSent).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn matches_global_and_scoped_subscriptions() {
        let session = Uuid::new_v4();
        let other_session = Uuid::new_v4();
        let owner = Uuid::new_v4();

        let global = make_webhook(owner, "https://a.example/hook", &[EventKind::MessageSent], None);
        let scoped = make_webhook(
            owner,
            "https://b.example/hook",
            &[EventKind::MessageSent],
            Some(session),
        );
        let wrong_scope = make_webhook(
            owner,
            "https://c.example/hook",
            &[EventKind::MessageSent],
            Some(other_session),
        );

        let registry = MemoryRegistry::default()
            .with_session(session, owner)
            .with_webhook(global.clone())
            .with_webhook(scoped.clone())
            .with_webhook(wrong_scope);

        let matches = match_webhooks(&registry, session, EventKind::MessageSent).await;
        let ids: Vec<Uuid> = matches.iter().map(|w| w.id).collect();
        assert_eq!(matches.len(), 2);
        assert!(ids.contains(&global.id));
        assert!(ids.contains(&scoped.id));
    }

    #[tokio::test]
    async fn skips_disabled_and_unsubscribed() {
        let session = Uuid::new_v4();
        let owner = Uuid::new_v4();

        let mut disabled =
            make_webhook(owner, "https://a.example/hook", &[EventKind::MessageSent], None);
        disabled.enabled = false;
        let other_event =
            make_webhook(owner, "https://b.example/hook", &[EventKind::MessageRead], None);

        let registry = MemoryRegistry::default()
            .with_session(session, owner)
            .with_webhook(disabled)
            .with_webhook(other_event);

        let matches = match_webhooks(&registry, session, EventKind::MessageSent).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn ignores_other_owners_subscriptions() {
        let session = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let foreign =
            make_webhook(stranger, "https://a.example/hook", &[EventKind::MessageSent], None);
        let registry = MemoryRegistry::default()
            .with_session(session, owner)
            .with_webhook(foreign);

        let matches = match_webhooks(&registry, session, EventKind::MessageSent).await;
        assert!(matches.is_empty());
    }
}
