//! Redis Streams Relay
//!
//! Durable command/event transport between this server and the WhatsApp
//! engine. Commands flow out through [`producer::StreamProducer`]; events
//! flow back in through [`consumer::EventConsumer`].

pub mod consumer;
pub mod envelope;
pub mod producer;

use serde::{Deserialize, Serialize};

/// Stream carrying commands to the engine.
pub const COMMAND_STREAM: &str = "whatsapp:commands";

/// Stream carrying events from the engine.
pub const EVENT_STREAM: &str = "whatsapp:events";

/// Stream collecting publish-failure diagnostics.
pub const ERROR_STREAM: &str = "whatsapp:errors";

/// Retention cap on the command stream (oldest entries evicted past this).
pub const COMMAND_STREAM_MAXLEN: i64 = 10_000;

/// Retention cap on the error stream.
pub const ERROR_STREAM_MAXLEN: i64 = 1_000;

/// Commands understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "INIT_SESSION")]
    InitSession,
    #[serde(rename = "SEND_TEXT")]
    SendText,
    #[serde(rename = "SEND_IMAGE")]
    SendImage,
    #[serde(rename = "SEND_AUDIO")]
    SendAudio,
    #[serde(rename = "SEND_VIDEO")]
    SendVideo,
    #[serde(rename = "LOGOUT")]
    Logout,
    #[serde(rename = "GET_STATUS")]
    GetStatus,
}

impl CommandKind {
    /// Convert to the wire string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitSession => "INIT_SESSION",
            Self::SendText => "SEND_TEXT",
            Self::SendImage => "SEND_IMAGE",
            Self::SendAudio => "SEND_AUDIO",
            Self::SendVideo => "SEND_VIDEO",
            Self::Logout => "LOGOUT",
            Self::GetStatus => "GET_STATUS",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
