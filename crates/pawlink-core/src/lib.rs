//! Domain model and per-room state machine for the Pawlink chat engine.
//!
//! This crate is pure state: no I/O, no clocks, no globals. It defines
//! the message/identity types shared across the engine and the
//! [`RoomSession`] state machine that merges three message sources —
//! history load results, live push events, and optimistic local sends —
//! into one ordered, de-duplicated sequence.
//!
//! # Ordering policy
//!
//! Display order is arrival/append order, not a timestamp sort. History
//! establishes the prefix; live or locally-echoed entries the history did
//! not contain are re-appended after it in their original relative order.
//! Server timestamps are carried opaquely for display.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod model;
mod session;

pub use error::ChatError;
pub use model::{
    AuthToken, Delivery, LocalEchoId, Message, MessageId, RoomId, SessionContext, UserId,
};
pub use session::{HistoryState, RoomConnectionState, RoomSession};
