//! Identity and message types.
//!
//! Identifiers are opaque strings assigned by the backend (the room id is
//! the adoption-application id). [`Message`] is the display-side model: a
//! wire message plus the optimistic-echo bookkeeping the merge logic
//! needs (a local echo id before the server assigns one, and a
//! per-message delivery status).

use std::fmt;

use pawlink_proto::WireMessage;

/// Conversation identifier. Equals the adoption-application id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

/// Backend user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

/// Server-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// The raw backend identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(RoomId);
string_id!(UserId);
string_id!(MessageId);

/// Client-assigned identifier for a not-yet-confirmed optimistic message.
///
/// A plain per-engine counter: unique within one engine instance, never
/// sent to the backend, discarded once the server id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalEchoId(pub u64);

/// Opaque bearer credential attached to every REST call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token handed to the client at login.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building an `Authorization: Bearer` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Tokens must not leak into logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Who is using the engine, passed explicitly at construction.
///
/// Nothing here is read from ambient storage; tests construct one
/// directly.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The authenticated user's id; used as `sender` on outbound
    /// messages and to recognize our own echo.
    pub user_id: UserId,

    /// Display name attached to optimistic local entries.
    pub display_name: String,

    /// Bearer credential for REST calls. `None` means unauthenticated:
    /// REST calls must not be attempted.
    pub token: Option<AuthToken>,
}

/// Durable-write status of a message, surfaced per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Optimistic entry; neither the durable write nor the server echo
    /// has confirmed it yet.
    Pending,

    /// Durably stored (or received from the server, which implies it).
    Sent,

    /// The durable write failed. The entry stays visible — the design
    /// accepts the shown/stored inconsistency and flags it instead of
    /// retracting the message.
    Failed(String),
}

/// A message as displayed, merged from history, live events, and local
/// sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id; `None` until an optimistic entry is confirmed.
    pub id: Option<MessageId>,

    /// Local echo id; `Some` only on entries this engine originated.
    pub local_id: Option<LocalEchoId>,

    /// Room the message belongs to. Immutable for the message's lifetime.
    pub room_id: RoomId,

    /// Author's user id.
    pub sender_id: UserId,

    /// Author's display name.
    pub sender_name: String,

    /// Message body (trimmed before send).
    pub text: String,

    /// Server-assigned ISO-8601 timestamp; `None` until confirmed.
    pub created_at: Option<String>,

    /// Durable-write status.
    pub delivery: Delivery,
}

impl Message {
    /// Build a display message from a server-confirmed wire message.
    pub fn from_wire(wire: WireMessage) -> Self {
        Self {
            id: Some(MessageId::from(wire.id)),
            local_id: None,
            room_id: RoomId::from(wire.application),
            sender_id: UserId::from(wire.sender.id),
            sender_name: wire.sender.name,
            text: wire.text,
            created_at: wire.created_at,
            delivery: Delivery::Sent,
        }
    }

    /// Build an optimistic local entry for a send in flight.
    pub fn local_echo(
        local_id: LocalEchoId,
        room_id: RoomId,
        ctx: &SessionContext,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            local_id: Some(local_id),
            room_id,
            sender_id: ctx.user_id.clone(),
            sender_name: ctx.display_name.clone(),
            text: text.into(),
            created_at: None,
            delivery: Delivery::Pending,
        }
    }

    /// True once the server has assigned this message an id.
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }
}
