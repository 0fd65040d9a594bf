//! Live-channel frames.
//!
//! The live channel carries named JSON events as WebSocket text frames:
//!
//! ```text
//! { "event": "joinRoom",       "data": "app123" }
//! { "event": "leaveRoom",      "data": "app123" }
//! { "event": "sendMessage",    "data": { "sender": ..., "application": ..., "text": ... } }
//! { "event": "receiveMessage", "data": { "_id": ..., "sender": { ... }, ... } }
//! ```
//!
//! [`ClientFrame`] models the outbound events, [`ServerFrame`] the
//! inbound ones. Encoding cannot fail for well-formed frames; decoding
//! rejects unknown events and shape mismatches with
//! [`ProtocolError::Decode`].

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    message::{SendPayload, WireMessage},
};

/// Events the client emits on the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Ask the server to route this room's events to our connection.
    ///
    /// Carries the adoption-application id acting as the room key. The
    /// server sends no acknowledgement; join is a side effect.
    JoinRoom(String),

    /// Best-effort departure signal for a room.
    LeaveRoom(String),

    /// Fan a new message out to the room's participants.
    ///
    /// Delivery only; durability is a separate `POST /api/messages`.
    SendMessage(SendPayload),
}

/// Events the server pushes on the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    /// A message addressed to a room this connection has joined.
    ///
    /// Also the authoritative echo of the client's own sends.
    ReceiveMessage(WireMessage),
}

impl ClientFrame {
    /// Encode this frame as a WebSocket text payload.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Room id this frame concerns.
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom(room_id) | Self::LeaveRoom(room_id) => room_id,
            Self::SendMessage(payload) => &payload.application,
        }
    }
}

impl ServerFrame {
    /// Decode a WebSocket text payload into a server frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::WireSender;

    #[test]
    fn join_room_uses_camel_case_event_name() {
        let frame = ClientFrame::JoinRoom("app123".to_string());
        let json: serde_json::Value =
            serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(json["event"], "joinRoom");
        assert_eq!(json["data"], "app123");
    }

    #[test]
    fn leave_room_encodes_room_id() {
        let frame = ClientFrame::LeaveRoom("app123".to_string());
        let json: serde_json::Value =
            serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(json["event"], "leaveRoom");
        assert_eq!(json["data"], "app123");
    }

    #[test]
    fn send_message_nests_the_payload() {
        let frame = ClientFrame::SendMessage(SendPayload {
            sender: "u1".to_string(),
            application: "app123".to_string(),
            text: "Hello".to_string(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(json["event"], "sendMessage");
        assert_eq!(json["data"]["application"], "app123");
        assert_eq!(json["data"]["text"], "Hello");
    }

    #[test]
    fn receive_message_round_trips() {
        let text = r#"{
            "event": "receiveMessage",
            "data": {
                "_id": "m1",
                "sender": { "_id": "u1", "name": "Dana" },
                "application": "app123",
                "text": "Hi",
                "createdAt": "2024-05-01T12:00:00.000Z"
            }
        }"#;

        let ServerFrame::ReceiveMessage(msg) = ServerFrame::decode(text).unwrap();
        assert_eq!(
            msg,
            WireMessage {
                id: "m1".to_string(),
                sender: WireSender { id: "u1".to_string(), name: "Dana".to_string() },
                application: "app123".to_string(),
                text: "Hi".to_string(),
                created_at: Some("2024-05-01T12:00:00.000Z".to_string()),
            }
        );
    }

    #[test]
    fn room_id_is_exposed_for_every_outbound_frame() {
        let send = ClientFrame::SendMessage(SendPayload {
            sender: "u1".to_string(),
            application: "app9".to_string(),
            text: "x".to_string(),
        });

        assert_eq!(ClientFrame::JoinRoom("app9".to_string()).room_id(), "app9");
        assert_eq!(ClientFrame::LeaveRoom("app9".to_string()).room_id(), "app9");
        assert_eq!(send.room_id(), "app9");
    }
}
