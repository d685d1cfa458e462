//! Per-Session Pairing Channels
//!
//! Explicit broadcast registry keyed by session id, bridging Redis pub/sub
//! into in-process `tokio::sync::broadcast` channels. The first local
//! subscriber for a session issues the Redis SUBSCRIBE; dropping the last
//! one removes the entry and unsubscribes, so an abandoned pairing screen
//! never leaks a subscription.

use std::sync::Arc;

use dashmap::DashMap;
use fred::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{channel_name, parse_channel_name, PairingMessage};
use crate::streams::envelope::Envelope;

/// Buffered messages per session channel.
const CHANNEL_CAPACITY: usize = 64;

type ChannelMap = DashMap<Uuid, broadcast::Sender<PairingMessage>>;

/// Registry of live pairing channels backed by one subscriber connection.
pub struct SessionChannels {
    subscriber: Client,
    channels: Arc<ChannelMap>,
}

impl SessionChannels {
    /// Wrap a dedicated subscriber connection and start the fan-out task
    /// that routes incoming pub/sub messages to session channels.
    #[must_use]
    pub fn new(subscriber: Client) -> Arc<Self> {
        let channels: Arc<ChannelMap> = Arc::new(DashMap::new());

        let mut messages = subscriber.message_rx();
        let routing = Arc::clone(&channels);
        tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => route_message(&routing, &message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Pairing fan-out lagged behind pub/sub");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Pairing fan-out task ended");
        });

        Arc::new(Self {
            subscriber,
            channels,
        })
    }

    /// Subscribe to a session's pairing channel. The returned subscription
    /// releases the channel (and the Redis subscription) on drop.
    pub async fn subscribe(&self, session_id: Uuid) -> Result<PairingSubscription, Error> {
        let rx = self
            .channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        // SUBSCRIBE is idempotent; issuing it per local subscriber keeps the
        // bookkeeping simple.
        if let Err(e) = self.subscriber.subscribe(channel_name(session_id)).await {
            drop(rx);
            self.channels
                .remove_if(&session_id, |_, tx| tx.receiver_count() == 0);
            return Err(e);
        }

        Ok(PairingSubscription {
            rx,
            guard: ChannelGuard {
                session_id,
                channels: Arc::clone(&self.channels),
                subscriber: self.subscriber.clone(),
            },
        })
    }

    /// Number of sessions with at least one live subscriber.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.channels.len()
    }
}

fn route_message(channels: &ChannelMap, message: &fred::types::Message) {
    let channel = message.channel.to_string();
    let Some(session_id) = parse_channel_name(&channel) else {
        return;
    };
    let Some(sender) = channels.get(&session_id) else {
        return;
    };
    let Some(bytes) = message.value.as_bytes() else {
        debug!(%channel, "Non-bytes pub/sub payload, ignoring");
        return;
    };

    let envelope = match Envelope::decode(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%channel, error = %e, "Invalid pairing message");
            return;
        }
    };

    match PairingMessage::from_envelope(&envelope) {
        // A send error just means no receiver is currently polling.
        Some(message) => {
            let _ = sender.send(message);
        }
        None => debug!(%channel, kind = %envelope.kind, "Ignoring non-pairing message kind"),
    }
}

/// One client's live subscription to a session's pairing channel.
pub struct PairingSubscription {
    rx: broadcast::Receiver<PairingMessage>,
    guard: ChannelGuard,
}

impl PairingSubscription {
    /// Split into the message receiver and the cleanup guard. The receiver
    /// must be dropped before (or together with) the guard for the
    /// reference count to settle.
    #[must_use]
    pub fn into_parts(self) -> (broadcast::Receiver<PairingMessage>, ChannelGuard) {
        (self.rx, self.guard)
    }
}

/// Releases the session channel once the last local subscriber is gone.
pub struct ChannelGuard {
    session_id: Uuid,
    channels: Arc<ChannelMap>,
    subscriber: Client,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let removed = self
            .channels
            .remove_if(&self.session_id, |_, tx| tx.receiver_count() == 0)
            .is_some();

        if removed {
            let client = self.subscriber.clone();
            let channel = channel_name(self.session_id);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = client.unsubscribe(channel.clone()).await {
                        warn!(%channel, "Failed to unsubscribe pairing channel: {}", e);
                    } else {
                        debug!(%channel, "Unsubscribed pairing channel");
                    }
                });
            }
        }
    }
}
