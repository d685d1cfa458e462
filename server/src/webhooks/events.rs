//! Webhook Event Types
//!
//! The catalog of event types subscribers can register for, matching the
//! strings the engine emits.

use serde::{Deserialize, Serialize};

/// Event types available for webhook subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // Messages
    #[serde(rename = "message.received")]
    MessageReceived,
    #[serde(rename = "message.received.personal")]
    MessageReceivedPersonal,
    #[serde(rename = "message.received.group")]
    MessageReceivedGroup,
    #[serde(rename = "message.sent")]
    MessageSent,
    #[serde(rename = "message.delivered")]
    MessageDelivered,
    #[serde(rename = "message.read")]
    MessageRead,
    #[serde(rename = "message.failed")]
    MessageFailed,
    #[serde(rename = "message.updated")]
    MessageUpdated,
    #[serde(rename = "message.deleted")]
    MessageDeleted,
    #[serde(rename = "message.reaction")]
    MessageReaction,

    // Sessions
    #[serde(rename = "session.connected")]
    SessionConnected,
    #[serde(rename = "session.disconnected")]
    SessionDisconnected,
    #[serde(rename = "session.qr.updated")]
    SessionQrUpdated,
    #[serde(rename = "session.reconnecting")]
    SessionReconnecting,

    // Chats
    #[serde(rename = "chat.created")]
    ChatCreated,
    #[serde(rename = "chat.updated")]
    ChatUpdated,
    #[serde(rename = "chat.deleted")]
    ChatDeleted,
    #[serde(rename = "chat.archived")]
    ChatArchived,

    // Groups
    #[serde(rename = "group.created")]
    GroupCreated,
    #[serde(rename = "group.updated")]
    GroupUpdated,
    #[serde(rename = "group.participant.added")]
    GroupParticipantAdded,
    #[serde(rename = "group.participant.removed")]
    GroupParticipantRemoved,
    #[serde(rename = "group.participant.promoted")]
    GroupParticipantPromoted,
    #[serde(rename = "group.participant.demoted")]
    GroupParticipantDemoted,

    // Contacts
    #[serde(rename = "contact.created")]
    ContactCreated,
    #[serde(rename = "contact.updated")]
    ContactUpdated,

    // Calls
    #[serde(rename = "call.incoming")]
    CallIncoming,
    #[serde(rename = "call.missed")]
    CallMissed,
}

impl EventKind {
    /// Every event type, in catalog order.
    pub const ALL: &'static [Self] = &[
        Self::MessageReceived,
        Self::MessageReceivedPersonal,
        Self::MessageReceivedGroup,
        Self::MessageSent,
        Self::MessageDelivered,
        Self::MessageRead,
        Self::MessageFailed,
        Self::MessageUpdated,
        Self::MessageDeleted,
        Self::MessageReaction,
        Self::SessionConnected,
        Self::SessionDisconnected,
        Self::SessionQrUpdated,
        Self::SessionReconnecting,
        Self::ChatCreated,
        Self::ChatUpdated,
        Self::ChatDeleted,
        Self::ChatArchived,
        Self::GroupCreated,
        Self::GroupUpdated,
        Self::GroupParticipantAdded,
        Self::GroupParticipantRemoved,
        Self::GroupParticipantPromoted,
        Self::GroupParticipantDemoted,
        Self::ContactCreated,
        Self::ContactUpdated,
        Self::CallIncoming,
        Self::CallMissed,
    ];

    /// Recommended starter subscription set.
    pub const DEFAULTS: &'static [Self] = &[
        Self::MessageReceived,
        Self::MessageSent,
        Self::MessageDelivered,
        Self::MessageRead,
        Self::SessionConnected,
        Self::SessionDisconnected,
    ];

    /// Parse from a string (e.g., `"message.sent"`).
    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == s)
    }

    /// Convert to the dot-separated string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MessageReceived => "message.received",
            Self::MessageReceivedPersonal => "message.received.personal",
            Self::MessageReceivedGroup => "message.received.group",
            Self::MessageSent => "message.sent",
            Self::MessageDelivered => "message.delivered",
            Self::MessageRead => "message.read",
            Self::MessageFailed => "message.failed",
            Self::MessageUpdated => "message.updated",
            Self::MessageDeleted => "message.deleted",
            Self::MessageReaction => "message.reaction",
            Self::SessionConnected => "session.connected",
            Self::SessionDisconnected => "session.disconnected",
            Self::SessionQrUpdated => "session.qr.updated",
            Self::SessionReconnecting => "session.reconnecting",
            Self::ChatCreated => "chat.created",
            Self::ChatUpdated => "chat.updated",
            Self::ChatDeleted => "chat.deleted",
            Self::ChatArchived => "chat.archived",
            Self::GroupCreated => "group.created",
            Self::GroupUpdated => "group.updated",
            Self::GroupParticipantAdded => "group.participant.added",
            Self::GroupParticipantRemoved => "group.participant.removed",
            Self::GroupParticipantPromoted => "group.participant.promoted",
            Self::GroupParticipantDemoted => "group.participant.demoted",
            Self::ContactCreated => "contact.created",
            Self::ContactUpdated => "contact.updated",
            Self::CallIncoming => "call.incoming",
            Self::CallMissed => "call.missed",
        }
    }

    /// Catalog category for grouping in the events listing.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::MessageReceived
            | Self::MessageReceivedPersonal
            | Self::MessageReceivedGroup
            | Self::MessageSent
            | Self::MessageDelivered
            | Self::MessageRead
            | Self::MessageFailed
            | Self::MessageUpdated
            | Self::MessageDeleted
            | Self::MessageReaction => "messages",
            Self::SessionConnected
            | Self::SessionDisconnected
            | Self::SessionQrUpdated
            | Self::SessionReconnecting => "sessions",
            Self::ChatCreated | Self::ChatUpdated | Self::ChatDeleted | Self::ChatArchived => {
                "chats"
            }
            Self::GroupCreated
            | Self::GroupUpdated
            | Self::GroupParticipantAdded
            | Self::GroupParticipantRemoved
            | Self::GroupParticipantPromoted
            | Self::GroupParticipantDemoted => "groups",
            Self::ContactCreated | Self::ContactUpdated => "contacts",
            Self::CallIncoming | Self::CallMissed => "calls",
        }
    }

    /// Human-readable description for the events listing.
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::MessageReceived => "Any incoming message received",
            Self::MessageReceivedPersonal => "Personal/DM message received",
            Self::MessageReceivedGroup => "Group message received",
            Self::MessageSent => "Message sent successfully",
            Self::MessageDelivered => "Message delivered to recipient",
            Self::MessageRead => "Message read by recipient",
            Self::MessageFailed => "Message sending failed",
            Self::MessageUpdated => "Message was edited",
            Self::MessageDeleted => "Message was deleted",
            Self::MessageReaction => "Reaction added to message",
            Self::SessionConnected => "WhatsApp session connected",
            Self::SessionDisconnected => "WhatsApp session disconnected",
            Self::SessionQrUpdated => "QR code updated for scanning",
            Self::SessionReconnecting => "Session is reconnecting",
            Self::ChatCreated => "New chat created",
            Self::ChatUpdated => "Chat metadata updated",
            Self::ChatDeleted => "Chat deleted",
            Self::ChatArchived => "Chat archived",
            Self::GroupCreated => "New group created",
            Self::GroupUpdated => "Group metadata updated",
            Self::GroupParticipantAdded => "Participant added to group",
            Self::GroupParticipantRemoved => "Participant removed from group",
            Self::GroupParticipantPromoted => "Participant promoted to admin",
            Self::GroupParticipantDemoted => "Admin demoted to participant",
            Self::ContactCreated => "New contact synced",
            Self::ContactUpdated => "Contact info updated",
            Self::CallIncoming => "Incoming call notification",
            Self::CallMissed => "Missed call notification",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
