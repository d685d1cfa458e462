//! Command/Event Envelope Codec
//!
//! The uniform wire wrapper around every command and event. The payload is
//! opaque to the codec; only the envelope structure itself is validated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Envelope schema version stamped on new envelopes.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Wire envelope for commands and events.
///
/// The engine omits `version` on its events, so decoding defaults it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

fn default_version() -> String {
    ENVELOPE_VERSION.to_string()
}

/// Envelope codec errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Envelope {
    /// Wrap a payload in a fresh envelope with a new id and current timestamp.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            version: ENVELOPE_VERSION.to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Encode to compact JSON.
    ///
    /// Object keys within the payload serialize in sorted order, so the same
    /// envelope always encodes to the same bytes and can be signed.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an envelope from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Session id carried in the payload, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        self.payload
            .get("session_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_type_and_payload() {
        let payload = json!({"session_id": "not-a-uuid", "to": "+15551234567", "message": "hi"});
        let envelope = Envelope::new("SEND_TEXT", payload.clone());

        let encoded = envelope.encode().unwrap();
        let decoded = Envelope::decode(encoded.as_bytes()).unwrap();

        assert_eq!(decoded.id, envelope.id);
        assert_eq!(decoded.kind, "SEND_TEXT");
        assert_eq!(decoded.version, ENVELOPE_VERSION);
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.timestamp, envelope.timestamp);
    }

    #[test]
    fn decode_defaults_missing_version() {
        // Engine events carry no version field
        let raw = r#"{"id":"6dbf2b5e-2b11-4f38-9c3c-0a9eaf2ff1be","type":"message.sent","timestamp":"2024-05-01T12:00:00Z","payload":{"session_id":"a"}}"#;
        let decoded = Envelope::decode(raw.as_bytes()).unwrap();
        assert_eq!(decoded.version, "1.0");
        assert_eq!(decoded.kind, "message.sent");
    }

    #[test]
    fn decode_rejects_malformed_structure() {
        assert!(matches!(
            Envelope::decode(b"not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(br#"{"id":"nope","type":"x"}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn decode_tolerates_unexpected_payload_shapes() {
        let envelope = Envelope::new("weird", json!([1, {"nested": null}, "three"]));
        let decoded = Envelope::decode(envelope.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[test]
    fn encoding_is_compact_and_stable() {
        let envelope = Envelope::new("EVENT", json!({"zeta": 1, "alpha": 2}));
        let first = envelope.encode().unwrap();
        let second = envelope.encode().unwrap();
        assert_eq!(first, second);
        assert!(!first.contains(": "));
        // Payload keys come out sorted
        assert!(first.find("\"alpha\"").unwrap() < first.find("\"zeta\"").unwrap());
    }

    #[test]
    fn session_id_extraction() {
        let sid = Uuid::new_v4();
        let envelope = Envelope::new("message.sent", json!({"session_id": sid.to_string()}));
        assert_eq!(envelope.session_id(), Some(sid));

        let none = Envelope::new("message.sent", json!({"other": true}));
        assert_eq!(none.session_id(), None);

        let invalid = Envelope::new("message.sent", json!({"session_id": "garbage"}));
        assert_eq!(invalid.session_id(), None);
    }
}
