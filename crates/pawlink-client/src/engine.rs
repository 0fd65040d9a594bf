//! Engine state machine.
//!
//! The `ChatEngine` is the top-level state machine that manages the open
//! room sessions and orchestrates the join/history/send flows. It is
//! pure: every network effect is returned as a [`ChatAction`] for the
//! caller to execute, and every network result comes back in as a
//! [`ChatEvent`].
//!
//! Session identity (user id, display name, bearer credential) is
//! injected at construction and never read from ambient state.

use std::collections::HashMap;

use pawlink_core::{ChatError, LocalEchoId, Message, RoomId, RoomSession, SessionContext};
use pawlink_proto::{ClientFrame, SendPayload, WireMessage};

use crate::event::{ChatAction, ChatEvent};

/// Multi-room chat engine for one authenticated user.
pub struct ChatEngine {
    /// Who is chatting; injected, never read from globals.
    ctx: SessionContext,

    /// Sessions for rooms currently on screen, keyed by room id.
    ///
    /// A session acts as the room's event listener: it is registered
    /// before the join frame is emitted, so an event arriving right
    /// after the join always has somewhere to land.
    rooms: HashMap<RoomId, RoomSession>,

    /// Whether the shared socket is currently believed live.
    socket_live: bool,

    /// Monotonic counter for local echo ids.
    next_echo: u64,

    /// Monotonic fence for history loads. Engine-wide so that reopening
    /// a room can never collide with a load still in flight for its
    /// previous session.
    next_history_seq: u64,
}

impl ChatEngine {
    /// Create an engine for the given session.
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx, rooms: HashMap::new(), socket_live: false, next_echo: 0, next_history_seq: 0 }
    }

    /// The injected session context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Session state for a room, if it is open.
    pub fn room(&self, room_id: &RoomId) -> Option<&RoomSession> {
        self.rooms.get(room_id)
    }

    /// Check if a room is currently open.
    pub fn is_open(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Ids of all open rooms, sorted for deterministic iteration.
    pub fn open_rooms(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ChatEvent) -> Result<Vec<ChatAction>, ChatError> {
        match event {
            ChatEvent::OpenRoom { room_id } => Ok(self.handle_open_room(room_id)),
            ChatEvent::CloseRoom { room_id } => Ok(self.handle_close_room(&room_id)),
            ChatEvent::SocketConnected => Ok(self.handle_socket_connected()),
            ChatEvent::SocketDisconnected => Ok(self.handle_socket_disconnected()),
            ChatEvent::PushReceived(wire) => Ok(self.handle_push(wire)),
            ChatEvent::SendMessage { room_id, text } => self.handle_send(&room_id, &text),
            ChatEvent::RetryHistory { room_id } => self.handle_retry_history(&room_id),
            ChatEvent::HistoryLoaded { room_id, seq, messages } => {
                Ok(self.handle_history_loaded(&room_id, seq, messages))
            },
            ChatEvent::HistoryFailed { room_id, seq, error } => {
                Ok(self.handle_history_failed(&room_id, seq, &error))
            },
            ChatEvent::DurableWriteConfirmed { room_id, local_id, message } => {
                Ok(self.handle_write_confirmed(&room_id, local_id, message))
            },
            ChatEvent::DurableWriteFailed { room_id, local_id, error } => {
                Ok(self.handle_write_failed(&room_id, local_id, &error))
            },
        }
    }

    fn handle_open_room(&mut self, room_id: RoomId) -> Vec<ChatAction> {
        if self.rooms.contains_key(&room_id) {
            // Idempotent join: the session, its listener registration and
            // its history load all already exist.
            return vec![ChatAction::Log {
                message: format!("room {room_id} already open, join is a no-op"),
            }];
        }

        // Register the session (the listener) before the join frame can
        // possibly go out.
        let mut session = RoomSession::new(room_id.clone());

        self.next_history_seq += 1;
        let seq = self.next_history_seq;
        session.begin_history_load(seq);

        let mut actions = Vec::new();
        if self.socket_live {
            session.mark_joined();
            actions.push(ChatAction::Emit(ClientFrame::JoinRoom(room_id.as_str().to_string())));
        }
        self.rooms.insert(room_id.clone(), session);

        actions.push(ChatAction::LoadHistory { room_id: room_id.clone(), seq });
        actions.push(ChatAction::Log { message: format!("opened room {room_id}") });
        actions
    }

    fn handle_close_room(&mut self, room_id: &RoomId) -> Vec<ChatAction> {
        if self.rooms.remove(room_id).is_none() {
            // Leave is best-effort; closing a room that is not open is
            // not an error.
            return vec![ChatAction::Log {
                message: format!("room {room_id} not open, leave skipped"),
            }];
        }

        let mut actions = Vec::new();
        if self.socket_live {
            actions.push(ChatAction::Emit(ClientFrame::LeaveRoom(room_id.as_str().to_string())));
        }
        actions.push(ChatAction::Log { message: format!("closed room {room_id}") });
        actions
    }

    fn handle_socket_connected(&mut self) -> Vec<ChatAction> {
        self.socket_live = true;

        // Re-join every open room; on a reconnect the server has lost
        // the previous connection's memberships.
        let mut actions = Vec::new();
        for room_id in self.open_rooms() {
            if let Some(session) = self.rooms.get_mut(&room_id) {
                session.mark_joined();
            }
            actions.push(ChatAction::Emit(ClientFrame::JoinRoom(room_id.as_str().to_string())));
        }
        actions.push(ChatAction::Log {
            message: format!("socket up, rejoined {} room(s)", self.rooms.len()),
        });
        actions
    }

    fn handle_socket_disconnected(&mut self) -> Vec<ChatAction> {
        self.socket_live = false;
        for session in self.rooms.values_mut() {
            session.mark_disconnected();
        }
        vec![ChatAction::Log { message: "socket down".to_string() }]
    }

    fn handle_push(&mut self, wire: WireMessage) -> Vec<ChatAction> {
        let room_id = RoomId::from(wire.application.as_str());

        let Some(session) = self.rooms.get_mut(&room_id) else {
            // Room isolation: events for rooms we no longer (or never)
            // display are dropped, not buffered.
            return vec![ChatAction::Log {
                message: format!("dropping event for room {room_id} (not open)"),
            }];
        };

        let changed = session.apply_push(Message::from_wire(wire), &self.ctx.user_id);
        if changed {
            Vec::new()
        } else {
            vec![ChatAction::Log {
                message: format!("duplicate event for room {room_id} ignored"),
            }]
        }
    }

    fn handle_send(&mut self, room_id: &RoomId, text: &str) -> Result<Vec<ChatAction>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::validation("message text is empty"));
        }

        let Some(session) = self.rooms.get_mut(room_id) else {
            return Err(ChatError::validation(format!("room {room_id} is not open")));
        };

        self.next_echo += 1;
        let local_id = LocalEchoId(self.next_echo);
        session.append_local(Message::local_echo(local_id, room_id.clone(), &self.ctx, text));

        let payload = SendPayload {
            sender: self.ctx.user_id.as_str().to_string(),
            application: room_id.as_str().to_string(),
            text: text.to_string(),
        };

        // Live emit and durable write are independent: either may fail
        // without blocking or rolling back the other.
        Ok(vec![
            ChatAction::Emit(ClientFrame::SendMessage(payload.clone())),
            ChatAction::PostMessage { room_id: room_id.clone(), local_id, payload },
        ])
    }

    fn handle_retry_history(&mut self, room_id: &RoomId) -> Result<Vec<ChatAction>, ChatError> {
        let Some(session) = self.rooms.get_mut(room_id) else {
            return Err(ChatError::validation(format!("room {room_id} is not open")));
        };

        // A fresh fence also invalidates the previous load, so a slow
        // first response cannot overwrite the retried one.
        self.next_history_seq += 1;
        let seq = self.next_history_seq;
        session.begin_history_load(seq);

        Ok(vec![ChatAction::LoadHistory { room_id: room_id.clone(), seq }])
    }

    fn handle_history_loaded(
        &mut self,
        room_id: &RoomId,
        seq: u64,
        messages: Vec<WireMessage>,
    ) -> Vec<ChatAction> {
        let Some(session) = self.rooms.get_mut(room_id) else {
            return vec![ChatAction::Log {
                message: format!("discarding history for room {room_id} (no longer open)"),
            }];
        };

        let incoming = messages.into_iter().map(Message::from_wire).collect();
        if session.apply_history(seq, incoming) {
            Vec::new()
        } else {
            vec![ChatAction::Log {
                message: format!("discarding stale history (seq {seq}) for room {room_id}"),
            }]
        }
    }

    fn handle_history_failed(
        &mut self,
        room_id: &RoomId,
        seq: u64,
        error: &ChatError,
    ) -> Vec<ChatAction> {
        let Some(session) = self.rooms.get_mut(room_id) else {
            return vec![ChatAction::Log {
                message: format!("ignoring history failure for room {room_id} (no longer open)"),
            }];
        };

        if session.history_failed(seq, error.to_string()) {
            vec![ChatAction::Log {
                message: format!("history load failed for room {room_id}: {error}"),
            }]
        } else {
            vec![ChatAction::Log {
                message: format!("ignoring stale history failure (seq {seq}) for room {room_id}"),
            }]
        }
    }

    fn handle_write_confirmed(
        &mut self,
        room_id: &RoomId,
        local_id: LocalEchoId,
        message: WireMessage,
    ) -> Vec<ChatAction> {
        let Some(session) = self.rooms.get_mut(room_id) else {
            return vec![ChatAction::Log {
                message: format!("write confirmation for closed room {room_id} dropped"),
            }];
        };

        if session.confirm_local(local_id, Message::from_wire(message)) {
            Vec::new()
        } else {
            vec![ChatAction::Log {
                message: format!("no local echo {local_id:?} left in room {room_id}"),
            }]
        }
    }

    fn handle_write_failed(
        &mut self,
        room_id: &RoomId,
        local_id: LocalEchoId,
        error: &ChatError,
    ) -> Vec<ChatAction> {
        let Some(session) = self.rooms.get_mut(room_id) else {
            return vec![ChatAction::Log {
                message: format!("write failure for closed room {room_id} dropped"),
            }];
        };

        // Flag, never retract: the optimistic entry stays visible with a
        // per-message failure indicator.
        session.fail_local(local_id, error.to_string());
        vec![ChatAction::Log {
            message: format!("durable write failed in room {room_id}: {error}"),
        }]
    }
}

/// Convenience used by tests and drivers alike.
impl ChatEngine {
    /// Number of open rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the engine currently believes the socket is live.
    pub fn socket_live(&self) -> bool {
        self.socket_live
    }
}
