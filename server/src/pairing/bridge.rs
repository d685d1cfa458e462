//! Pairing Stream Bridge
//!
//! State machine turning a session's pairing channel into push-stream
//! frames: heartbeats while idle, `qr` updates while waiting, then a single
//! terminal `connected` or `error` frame.

use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use super::PairingMessage;

/// Poll timeout per loop iteration.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Consecutive silent polls before the stream times out (~5 minutes).
const MAX_IDLE_POLLS: u32 = 300;

/// One frame of the pairing push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeFrame {
    Heartbeat,
    Qr(Value),
    Connected(Value),
    Error(Value),
}

/// Drive the bridge state machine over a pairing channel receiver.
///
/// The stream ends after a terminal frame (`Connected`, `Error`), after the
/// idle timeout, or when the sending side goes away.
pub fn bridge_frames(
    mut rx: broadcast::Receiver<PairingMessage>,
) -> impl Stream<Item = BridgeFrame> {
    async_stream::stream! {
        let mut idle_polls = 0u32;
        loop {
            if idle_polls >= MAX_IDLE_POLLS {
                yield BridgeFrame::Error(json!({"error": "Connection timeout"}));
                break;
            }

            match tokio::time::timeout(POLL_TIMEOUT, rx.recv()).await {
                // Silence: keep intermediaries from closing the transport
                Err(_elapsed) => {
                    idle_polls += 1;
                    yield BridgeFrame::Heartbeat;
                }
                Ok(Ok(PairingMessage::QrUpdated(payload))) => {
                    idle_polls = 0;
                    yield BridgeFrame::Qr(payload);
                }
                Ok(Ok(PairingMessage::Connected(payload))) => {
                    yield BridgeFrame::Connected(payload);
                    break;
                }
                Ok(Ok(PairingMessage::Failed(payload))) => {
                    yield BridgeFrame::Error(payload);
                    break;
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!(skipped, "Pairing stream lagged, continuing");
                    idle_polls = 0;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
            }
        }
    }
}

/// Map a bridge frame onto its SSE wire representation.
#[must_use]
pub fn frame_to_event(frame: BridgeFrame) -> Event {
    match frame {
        BridgeFrame::Heartbeat => Event::default().comment("heartbeat"),
        BridgeFrame::Qr(payload) => Event::default().event("qr").data(payload.to_string()),
        BridgeFrame::Connected(payload) => {
            Event::default().event("connected").data(payload.to_string())
        }
        BridgeFrame::Error(payload) => Event::default().event("error").data(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn qr_after_silence_keeps_stream_open() {
        let (tx, rx) = broadcast::channel(8);
        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        for _ in 0..10 {
            assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
        }

        tx.send(PairingMessage::QrUpdated(json!({"qr": "abc"})))
            .unwrap();
        assert_eq!(
            frames.next().await,
            Some(BridgeFrame::Qr(json!({"qr": "abc"})))
        );

        // Still open: next silent poll heartbeats again
        assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_300_silent_polls() {
        let (_tx, rx) = broadcast::channel::<PairingMessage>(8);
        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        for _ in 0..300 {
            assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
        }
        assert_eq!(
            frames.next().await,
            Some(BridgeFrame::Error(json!({"error": "Connection timeout"})))
        );
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn connected_terminates_without_further_heartbeats() {
        let (tx, rx) = broadcast::channel(8);
        tx.send(PairingMessage::Connected(json!({"phone": "+1555"})))
            .unwrap();

        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        assert_eq!(
            frames.next().await,
            Some(BridgeFrame::Connected(json!({"phone": "+1555"})))
        );
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_terminates_with_error_frame() {
        let (tx, rx) = broadcast::channel(8);
        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));

        tx.send(PairingMessage::Failed(json!({"reason": "pairing rejected"})))
            .unwrap();
        assert_eq!(
            frames.next().await,
            Some(BridgeFrame::Error(json!({"reason": "pairing rejected"})))
        );
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn qr_resets_idle_counter() {
        let (tx, rx) = broadcast::channel(8);
        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        for _ in 0..299 {
            assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
        }
        tx.send(PairingMessage::QrUpdated(json!({"qr": "fresh"})))
            .unwrap();
        assert_eq!(
            frames.next().await,
            Some(BridgeFrame::Qr(json!({"qr": "fresh"})))
        );

        // Counter restarted: plenty of heartbeats before any timeout
        for _ in 0..5 {
            assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sender_drop_closes_stream() {
        let (tx, rx) = broadcast::channel::<PairingMessage>(8);
        let frames = bridge_frames(rx);
        tokio::pin!(frames);

        assert_eq!(frames.next().await, Some(BridgeFrame::Heartbeat));
        drop(tx);
        assert_eq!(frames.next().await, None);
    }
}
