//! Chat client engine
//!
//! Action-based client engine for the Pawlink adoption-chat backend. A
//! room (one conversation per adoption application) combines two
//! channels: a persistent WebSocket for live fan-out and a REST API for
//! the durable transcript. The engine merges both, plus the user's own
//! optimistic sends, into one ordered de-duplicated sequence per room.
//!
//! # Architecture
//!
//! The engine is sans-IO: it receives events ([`ChatEvent`]), processes
//! them through pure state machine logic, and returns actions
//! ([`ChatAction`]) for the caller to execute. Unit tests drive it with
//! synthetic events and never touch a socket.
//!
//! # Components
//!
//! - [`ChatEngine`]: state machine managing the open room sessions
//! - [`ChatEvent`]: events fed into the engine
//! - [`ChatAction`]: actions produced by the engine
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled (the default), this crate also
//! provides:
//! - [`transport::ConnectionManager`]: single shared WebSocket per tab
//! - [`rest::RestClient`]: history load and durable message writes
//! - [`driver::ChatDriver`]: orchestration loop wiring engine actions to
//!   both

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod engine;
mod event;

#[cfg(feature = "transport")]
pub mod driver;
#[cfg(feature = "transport")]
pub mod rest;
#[cfg(feature = "transport")]
pub mod transport;

pub use engine::ChatEngine;
pub use event::{ChatAction, ChatEvent};
pub use pawlink_core::{
    ChatError, Delivery, HistoryState, LocalEchoId, Message, RoomConnectionState, RoomId,
    RoomSession, SessionContext, UserId,
};
