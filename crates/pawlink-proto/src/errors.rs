//! Protocol error types.
//!
//! Strongly-typed errors for wire-level failures: malformed JSON, unknown
//! event names, shape mismatches. Transport failures (socket drops, HTTP
//! errors) belong to higher layers; this crate only reports that bytes do
//! not parse as the contract says they should.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame failed to serialize to JSON.
    ///
    /// This indicates a bug (the frame types are always serializable) or
    /// an allocation failure, not bad peer input.
    #[error("frame encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Incoming text did not parse as a known frame.
    ///
    /// Covers malformed JSON, unknown `event` names, and payloads whose
    /// shape does not match the event.
    #[error("frame decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use crate::ServerFrame;

    #[test]
    fn unknown_event_is_a_decode_error() {
        let err = ServerFrame::decode(r#"{"event":"petOfTheDay","data":{}}"#);
        assert!(matches!(err, Err(super::ProtocolError::Decode(_))));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = ServerFrame::decode("not json");
        assert!(matches!(err, Err(super::ProtocolError::Decode(_))));
    }
}
