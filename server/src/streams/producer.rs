//! Command Publisher
//!
//! Appends enveloped commands to the bounded command stream. Publish
//! failures are mirrored onto a smaller error stream for monitoring and then
//! surfaced to the caller; a command is never silently dropped.

use chrono::Utc;
use fred::interfaces::StreamsInterface;
use fred::prelude::*;
use serde_json::{json, Value};
use tracing::{error, info};

use super::envelope::Envelope;
use super::{
    CommandKind, COMMAND_STREAM, COMMAND_STREAM_MAXLEN, ERROR_STREAM, ERROR_STREAM_MAXLEN,
    EVENT_STREAM,
};

/// Publishes commands and events to Redis Streams.
#[derive(Clone)]
pub struct StreamProducer {
    redis: Client,
}

impl StreamProducer {
    #[must_use]
    pub const fn new(redis: Client) -> Self {
        Self { redis }
    }

    /// Publish a command to the engine's command stream.
    ///
    /// Returns the stream-assigned entry id.
    pub async fn publish_command(&self, kind: CommandKind, payload: Value) -> Result<String, Error> {
        self.publish(kind.as_str(), payload, COMMAND_STREAM, COMMAND_STREAM_MAXLEN)
            .await
    }

    /// Publish an event envelope (same wire shape as commands). Used by
    /// tooling and tests that synthesize engine events.
    pub async fn publish_event(&self, kind: &str, payload: Value) -> Result<String, Error> {
        self.publish(kind, payload, EVENT_STREAM, COMMAND_STREAM_MAXLEN)
            .await
    }

    /// Wrap `payload` in an envelope and append it to `stream`, trimming the
    /// stream to roughly `maxlen` entries.
    pub async fn publish(
        &self,
        kind: &str,
        payload: Value,
        stream: &str,
        maxlen: i64,
    ) -> Result<String, Error> {
        let envelope = Envelope::new(kind, payload);
        let encoded = envelope
            .encode()
            .map_err(|e| Error::new(ErrorKind::Parse, format!("JSON serialize error: {e}")))?;

        let appended: Result<String, Error> = self
            .redis
            .xadd(stream, false, ("MAXLEN", "~", maxlen), "*", ("data", encoded.as_str()))
            .await;

        match appended {
            Ok(position) => {
                info!(
                    stream,
                    kind,
                    envelope_id = %envelope.id,
                    position = %position,
                    "Published command"
                );
                Ok(position)
            }
            Err(e) => {
                error!(stream, kind, "Failed to publish command: {}", e);
                self.record_publish_failure(kind, &e, &envelope.payload).await;
                Err(e)
            }
        }
    }

    /// Best-effort diagnostic record on the error stream. A failure of this
    /// write itself is only logged; the original error still reaches the
    /// caller.
    async fn record_publish_failure(&self, operation: &str, failure: &Error, context: &Value) {
        let record = json!({
            "operation": operation,
            "error": failure.to_string(),
            "context": context,
            "timestamp": Utc::now(),
        });

        let mirrored: Result<String, Error> = self
            .redis
            .xadd(
                ERROR_STREAM,
                false,
                ("MAXLEN", "~", ERROR_STREAM_MAXLEN),
                "*",
                ("data", record.to_string().as_str()),
            )
            .await;

        if let Err(e) = mirrored {
            error!("Failed to record publish failure to error stream: {}", e);
        }
    }
}
