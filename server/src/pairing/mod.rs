//! Session Pairing
//!
//! During device pairing the engine publishes QR and lifecycle notices on a
//! per-session Redis pub/sub channel. This module turns those notices into a
//! server-push stream for the one client waiting on the pairing screen.

pub mod bridge;
pub mod channels;

pub use channels::SessionChannels;

use serde_json::Value;
use uuid::Uuid;

use crate::streams::envelope::Envelope;

/// Lifecycle notices carried on a session's pairing channel.
#[derive(Debug, Clone)]
pub enum PairingMessage {
    QrUpdated(Value),
    Connected(Value),
    Failed(Value),
}

impl PairingMessage {
    /// Map an engine envelope onto a pairing message; other envelope kinds
    /// on the channel are ignored.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        match envelope.kind.as_str() {
            "QR_CODE_UPDATED" => Some(Self::QrUpdated(envelope.payload.clone())),
            "SESSION_CONNECTED" => Some(Self::Connected(envelope.payload.clone())),
            "SESSION_FAILED" => Some(Self::Failed(envelope.payload.clone())),
            _ => None,
        }
    }
}

/// Pub/sub channel name for a session.
#[must_use]
pub fn channel_name(session_id: Uuid) -> String {
    format!("session:{session_id}:events")
}

/// Inverse of [`channel_name`].
#[must_use]
pub fn parse_channel_name(channel: &str) -> Option<Uuid> {
    channel
        .strip_prefix("session:")?
        .strip_suffix(":events")
        .and_then(|id| Uuid::parse_str(id).ok())
}
