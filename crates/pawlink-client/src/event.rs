//! Engine events and actions.

use pawlink_core::{ChatError, LocalEchoId, RoomId};
use pawlink_proto::{ClientFrame, SendPayload, WireMessage};

/// Events the caller feeds into the engine.
///
/// The caller is responsible for:
/// - Receiving frames from the live socket and reporting its lifecycle
/// - Forwarding application intents (open/close a room, send a message)
/// - Feeding back the results of [`ChatAction::LoadHistory`] and
///   [`ChatAction::PostMessage`]
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The user navigated to a room.
    OpenRoom {
        /// Room to open (adoption-application id).
        room_id: RoomId,
    },

    /// The user navigated away from a room.
    CloseRoom {
        /// Room being torn down.
        room_id: RoomId,
    },

    /// The shared socket came up (first connect or reconnect).
    SocketConnected,

    /// The shared socket dropped.
    SocketDisconnected,

    /// A `receiveMessage` event arrived on the live socket.
    PushReceived(WireMessage),

    /// The user submitted a message for a room.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Raw composer text; trimmed and validated by the engine.
        text: String,
    },

    /// The user asked to retry a failed history load.
    ///
    /// Re-runs the transcript fetch on the existing session; live
    /// messages received meanwhile are kept and re-merged when the new
    /// result arrives.
    RetryHistory {
        /// Room whose transcript to re-fetch.
        room_id: RoomId,
    },

    /// A [`ChatAction::LoadHistory`] request completed.
    HistoryLoaded {
        /// Room the request was issued for.
        room_id: RoomId,
        /// Fence from the originating action.
        seq: u64,
        /// Transcript, oldest first.
        messages: Vec<WireMessage>,
    },

    /// A [`ChatAction::LoadHistory`] request failed.
    HistoryFailed {
        /// Room the request was issued for.
        room_id: RoomId,
        /// Fence from the originating action.
        seq: u64,
        /// Why the load failed.
        error: ChatError,
    },

    /// A [`ChatAction::PostMessage`] durable write succeeded.
    DurableWriteConfirmed {
        /// Room the message belongs to.
        room_id: RoomId,
        /// Local echo the confirmation refers to.
        local_id: LocalEchoId,
        /// The persisted message as the server stored it.
        message: WireMessage,
    },

    /// A [`ChatAction::PostMessage`] durable write failed.
    ///
    /// The optimistic entry is flagged, never retracted, and there is no
    /// automatic retry; the user may resend manually.
    DurableWriteFailed {
        /// Room the message belongs to.
        room_id: RoomId,
        /// Local echo the failure refers to.
        local_id: LocalEchoId,
        /// Why the write failed.
        error: ChatError,
    },
}

/// Actions the engine produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Send a frame on the live socket.
    ///
    /// Best-effort: a failed emit must not block or roll back anything
    /// else the same event produced.
    Emit(ClientFrame),

    /// Fetch the room transcript over REST.
    ///
    /// The caller feeds the result back as [`ChatEvent::HistoryLoaded`]
    /// or [`ChatEvent::HistoryFailed`], echoing `seq` unchanged.
    LoadHistory {
        /// Room to fetch.
        room_id: RoomId,
        /// Fence guarding against stale delivery.
        seq: u64,
    },

    /// Persist a message over REST.
    ///
    /// Independent of the live emit for the same send; the caller feeds
    /// the result back as [`ChatEvent::DurableWriteConfirmed`] or
    /// [`ChatEvent::DurableWriteFailed`].
    PostMessage {
        /// Room the message belongs to.
        room_id: RoomId,
        /// Local echo to reconcile on completion.
        local_id: LocalEchoId,
        /// Durable-write body.
        payload: SendPayload,
    },

    /// Diagnostic message for the caller's logger.
    Log {
        /// Log message.
        message: String,
    },
}
