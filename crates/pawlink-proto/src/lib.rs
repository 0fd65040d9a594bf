//! Wire contract for the Pawlink chat backend.
//!
//! The backend speaks two protocols and this crate models both:
//!
//! - **Live channel**: a persistent WebSocket carrying named JSON events.
//!   Outbound: `joinRoom`, `leaveRoom`, `sendMessage`. Inbound:
//!   `receiveMessage`. See [`ClientFrame`] and [`ServerFrame`].
//! - **REST**: `GET /api/messages/:roomId` returns an ordered array of
//!   [`WireMessage`] (oldest first); `POST /api/messages` takes a
//!   [`SendPayload`] and persists it.
//!
//! This crate is pure data: serde models plus encode/decode helpers. No
//! I/O, no state. Higher layers decide what to do with the frames.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod frame;
mod message;

pub use errors::{ProtocolError, Result};
pub use frame::{ClientFrame, ServerFrame};
pub use message::{SendPayload, WireMessage, WireSender};
