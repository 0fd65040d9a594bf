//! REST message shapes.
//!
//! The backend stores messages in a document database and exposes them
//! with its native field names: `_id` identifiers, an embedded sender
//! object on reads, and an ISO-8601 `createdAt` set by the server. The
//! write payload is flatter: bare ids only.

use serde::{Deserialize, Serialize};

/// A persisted message as the backend returns it.
///
/// Appears in `GET /api/messages/:roomId` responses (oldest first), in
/// `POST /api/messages` responses, and as the `data` of a
/// `receiveMessage` live event. The timestamp is carried opaquely;
/// display order is decided by the client, not by parsing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Server-assigned message identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// The author, denormalized for rendering.
    pub sender: WireSender,

    /// The adoption-application id this conversation is scoped to.
    pub application: String,

    /// Message body.
    pub text: String,

    /// Server-assigned creation timestamp (ISO-8601).
    ///
    /// Optional because the live echo of a just-sent message may be
    /// emitted before the durable write completes.
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Embedded sender object on message reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSender {
    /// Sender's user identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Sender's display name.
    ///
    /// Defaults to empty when the backend returns an unpopulated sender
    /// reference.
    #[serde(default)]
    pub name: String,
}

/// Body of a `sendMessage` live event and of `POST /api/messages`.
///
/// Unlike [`WireMessage`], the sender here is a bare user id: the server
/// resolves and embeds the profile on its side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPayload {
    /// Authoring user's id.
    pub sender: String,

    /// Target adoption-application (room) id.
    pub application: String,

    /// Message body.
    pub text: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_uses_backend_field_names() {
        let json = r#"{
            "_id": "m1",
            "sender": { "_id": "u1", "name": "Dana" },
            "application": "app123",
            "text": "Hi",
            "createdAt": "2024-05-01T12:00:00.000Z"
        }"#;

        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.sender.id, "u1");
        assert_eq!(msg.sender.name, "Dana");
        assert_eq!(msg.application, "app123");
        assert_eq!(msg.created_at.as_deref(), Some("2024-05-01T12:00:00.000Z"));
    }

    #[test]
    fn unpopulated_sender_defaults_to_empty_name() {
        let json = r#"{
            "_id": "m2",
            "sender": { "_id": "u2" },
            "application": "app123",
            "text": "Hello"
        }"#;

        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert!(msg.sender.name.is_empty());
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn send_payload_serializes_bare_ids() {
        let payload = SendPayload {
            sender: "u1".to_string(),
            application: "app123".to_string(),
            text: "Hello".to_string(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sender": "u1",
                "application": "app123",
                "text": "Hello"
            })
        );
    }
}
