//! Event types crossing the boundary to the presentation layer.
//!
//! Consumers subscribe via [`crate::coordinator::StreamCoordinator`]; both
//! event kinds fan out on bounded `tokio::sync::broadcast` channels, so a
//! slow subscriber observes lag instead of blocking the ingestion thread.

use serde::{Deserialize, Serialize};

use crate::chunk::SampleChunk;

/// Emitted for every decoded chunk while notifications are not paused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// The decoded chunk, already appended to the buffer when this fires.
    pub chunk: SampleChunk,
}

/// Emitted on every connection lifecycle transition.
///
/// Advisory only — consumers display it, nothing in the core keys control
/// flow off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatusEvent {
    pub state: LinkState,
    /// Human-readable reason, e.g. "Waiting for connections...".
    pub detail: Option<String>,
}

/// Connection lifecycle of the ingestion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Service created, not yet bound.
    Idle,
    /// Listening socket bound.
    Listening,
    /// Waiting for a peer to connect.
    Accepting,
    /// A peer is connected and frames are being read.
    Streaming,
    /// Stop requested; the service is shutting down.
    Closing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_event_serializes_with_camel_case() {
        let chunk = SampleChunk::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let event = ChunkEvent { seq: 9, chunk };

        let json = serde_json::to_value(&event).expect("serialize chunk event");
        assert_eq!(json["seq"], 9);
        assert_eq!(json["chunk"]["channels"], 2);
        assert_eq!(json["chunk"]["samplesPerChannel"], 2);

        let round_trip: ChunkEvent = serde_json::from_value(json).expect("deserialize chunk event");
        assert_eq!(round_trip.seq, 9);
        assert_eq!(round_trip.chunk.channel(1).unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn link_status_serializes_with_lowercase_state() {
        let event = LinkStatusEvent {
            state: LinkState::Accepting,
            detail: Some("Waiting for connections...".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["state"], "accepting");
        assert_eq!(json["detail"], "Waiting for connections...");

        let round_trip: LinkStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.state, LinkState::Accepting);
    }

    #[test]
    fn link_state_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<LinkState>(r#""Streaming""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
