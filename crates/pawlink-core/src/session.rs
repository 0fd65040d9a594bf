//! Per-room session state machine.
//!
//! A [`RoomSession`] exists while a room is on screen. It owns the merged
//! message sequence and enforces the merge invariants:
//!
//! - no server-confirmed message appears twice (de-duplication by id)
//! - display order is append order; a history load forms the prefix and
//!   surviving live/local entries are re-appended behind it in their
//!   original relative order
//! - the sender's own echo reconciles into the matching optimistic entry
//!   instead of appending a visual duplicate
//!
//! All mutation happens through `&mut self` on one session, so appends
//! are atomic by construction. Stale async results are fenced with a
//! per-session history sequence number: a load result carrying an old
//! sequence is discarded.

use std::collections::HashSet;

use crate::model::{Delivery, LocalEchoId, Message, MessageId, RoomId, UserId};

/// Live-channel membership state of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomConnectionState {
    /// The shared socket is down; no events will arrive.
    Disconnected,
    /// Waiting for the socket before the join signal can go out.
    Connecting,
    /// Join signal emitted on a live socket; events are expected.
    Joined,
}

/// History-load state surfaced to the surrounding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryState {
    /// Initial transcript fetch in flight.
    Loading,
    /// Transcript applied; the sequence is authoritative.
    Ready,
    /// Fetch failed; the room renders what it has plus a retry affordance.
    Failed(String),
}

/// State for one open conversation.
#[derive(Debug, Clone)]
pub struct RoomSession {
    room_id: RoomId,
    connection: RoomConnectionState,
    history: HistoryState,
    history_seq: u64,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl RoomSession {
    /// Create a session for a freshly opened room.
    ///
    /// Starts in [`RoomConnectionState::Connecting`] with an empty
    /// sequence and history [`HistoryState::Loading`].
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            connection: RoomConnectionState::Connecting,
            history: HistoryState::Loading,
            history_seq: 0,
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Room this session is scoped to.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Current membership state.
    pub fn connection(&self) -> RoomConnectionState {
        self.connection
    }

    /// Current history-load state.
    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    /// The merged, de-duplicated, append-ordered sequence for display.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Mark the join signal as emitted on a live socket.
    pub fn mark_joined(&mut self) {
        self.connection = RoomConnectionState::Joined;
    }

    /// Mark the session as waiting for a socket (reconnect in progress).
    pub fn mark_connecting(&mut self) {
        self.connection = RoomConnectionState::Connecting;
    }

    /// Mark the shared socket as gone.
    pub fn mark_disconnected(&mut self) {
        self.connection = RoomConnectionState::Disconnected;
    }

    /// Start a history load fenced by `seq`.
    ///
    /// The fence is allocated by the caller (a monotonic counter that
    /// survives room re-opens) and must be echoed back with the load
    /// result; results carrying any other value are stale and get
    /// discarded.
    pub fn begin_history_load(&mut self, seq: u64) {
        self.history_seq = seq;
        self.history = HistoryState::Loading;
    }

    /// Apply a history load result, oldest first.
    ///
    /// Returns `false` (and changes nothing) if `seq` is not the fence of
    /// the most recent [`Self::begin_history_load`]. Otherwise the history
    /// becomes the sequence prefix and previously appended entries
    /// survive behind it: confirmed ones only if the history did not
    /// already contain their id, unconfirmed local echoes always.
    pub fn apply_history(&mut self, seq: u64, incoming: Vec<Message>) -> bool {
        if seq != self.history_seq {
            return false;
        }

        let previous = std::mem::take(&mut self.messages);
        self.seen.clear();

        for msg in incoming {
            if let Some(id) = &msg.id {
                if !self.seen.insert(id.clone()) {
                    continue;
                }
            }
            self.messages.push(msg);
        }

        for msg in previous {
            match &msg.id {
                Some(id) => {
                    if self.seen.insert(id.clone()) {
                        self.messages.push(msg);
                    }
                },
                None => self.messages.push(msg),
            }
        }

        self.history = HistoryState::Ready;
        true
    }

    /// Record a failed history load.
    ///
    /// Returns `false` if `seq` is stale. The displayed sequence is left
    /// untouched: live events and local echoes keep rendering.
    pub fn history_failed(&mut self, seq: u64, reason: impl Into<String>) -> bool {
        if seq != self.history_seq {
            return false;
        }
        self.history = HistoryState::Failed(reason.into());
        true
    }

    /// Merge one live push event into the sequence.
    ///
    /// Returns `true` if the sequence changed. A confirmed id already
    /// present is dropped (transport redelivery, or the echo of a message
    /// the durable write already confirmed). The sender's own echo
    /// reconciles into the oldest matching optimistic entry rather than
    /// appending.
    pub fn apply_push(&mut self, msg: Message, self_user: &UserId) -> bool {
        if let Some(id) = &msg.id {
            if self.seen.contains(id) {
                return false;
            }
        }

        if msg.sender_id == *self_user {
            let pending = self
                .messages
                .iter_mut()
                .find(|m| m.id.is_none() && m.local_id.is_some() && m.text == msg.text);

            if let Some(entry) = pending {
                entry.id = msg.id.clone();
                entry.created_at = msg.created_at;
                if let Some(id) = msg.id {
                    self.seen.insert(id);
                }
                return true;
            }
        }

        if let Some(id) = &msg.id {
            self.seen.insert(id.clone());
        }
        self.messages.push(msg);
        true
    }

    /// Append an optimistic local entry at the end of the sequence.
    pub fn append_local(&mut self, msg: Message) {
        debug_assert!(msg.id.is_none() && msg.local_id.is_some());
        self.messages.push(msg);
    }

    /// Apply a durable-write confirmation to a local entry.
    ///
    /// Tolerates the live echo having arrived first in either shape: if
    /// the echo already reconciled this entry the confirmation only
    /// upgrades its delivery status, and if the echo appended a separate
    /// copy (the server altered the text) the local duplicate is removed.
    /// Returns `false` if no entry carries `local_id` (room was reopened
    /// meanwhile).
    pub fn confirm_local(&mut self, local_id: LocalEchoId, confirmed: Message) -> bool {
        let Some(pos) = self.messages.iter().position(|m| m.local_id == Some(local_id)) else {
            return false;
        };

        match confirmed.id {
            Some(id) if self.seen.contains(&id) => {
                if self.messages[pos].id.as_ref() == Some(&id) {
                    self.messages[pos].delivery = Delivery::Sent;
                } else {
                    self.messages.remove(pos);
                }
            },
            Some(id) => {
                let entry = &mut self.messages[pos];
                entry.id = Some(id.clone());
                entry.created_at = confirmed.created_at;
                entry.delivery = Delivery::Sent;
                self.seen.insert(id);
            },
            None => {
                self.messages[pos].delivery = Delivery::Sent;
            },
        }
        true
    }

    /// Mark a local entry's durable write as failed.
    ///
    /// The entry stays in the sequence with a per-message failure flag;
    /// the shown/stored gap is surfaced, not hidden. Returns `false` if
    /// the entry is gone.
    pub fn fail_local(&mut self, local_id: LocalEchoId, reason: impl Into<String>) -> bool {
        let Some(entry) = self.messages.iter_mut().find(|m| m.local_id == Some(local_id)) else {
            return false;
        };
        entry.delivery = Delivery::Failed(reason.into());
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::{AuthToken, SessionContext};

    fn ctx() -> SessionContext {
        SessionContext {
            user_id: UserId::from("me"),
            display_name: "Dana".to_string(),
            token: Some(AuthToken::new("tok")),
        }
    }

    fn confirmed(id: &str, sender: &str, text: &str) -> Message {
        Message {
            id: Some(MessageId::from(id)),
            local_id: None,
            room_id: RoomId::from("app123"),
            sender_id: UserId::from(sender),
            sender_name: sender.to_string(),
            text: text.to_string(),
            created_at: Some(format!("2024-05-01T12:00:00.{id}Z")),
            delivery: Delivery::Sent,
        }
    }

    fn session() -> RoomSession {
        RoomSession::new(RoomId::from("app123"))
    }

    #[test]
    fn new_session_is_connecting_and_loading() {
        let s = session();
        assert_eq!(s.connection(), RoomConnectionState::Connecting);
        assert_eq!(*s.history(), HistoryState::Loading);
        assert!(s.messages().is_empty());
    }

    #[test]
    fn duplicate_push_leaves_sequence_unchanged() {
        let mut s = session();
        let me = UserId::from("me");

        assert!(s.apply_push(confirmed("m1", "u2", "Hi"), &me));
        assert!(!s.apply_push(confirmed("m1", "u2", "Hi"), &me));
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn pushes_preserve_arrival_order() {
        let mut s = session();
        let me = UserId::from("me");

        for i in 0..5 {
            s.apply_push(confirmed(&format!("m{i}"), "u2", &format!("t{i}")), &me);
        }

        let ids: Vec<_> = s
            .messages()
            .iter()
            .map(|m| m.id.as_ref().unwrap().as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn history_forms_the_prefix_and_live_overlap_is_dropped() {
        let mut s = session();
        let me = UserId::from("me");
        let seq = 1;
        s.begin_history_load(seq);

        // m2 arrives live while the history request is in flight.
        s.apply_push(confirmed("m2", "u2", "second"), &me);

        let applied = s.apply_history(
            seq,
            vec![confirmed("m1", "u2", "first"), confirmed("m2", "u2", "second")],
        );
        assert!(applied);
        assert_eq!(*s.history(), HistoryState::Ready);

        let ids: Vec<_> =
            s.messages().iter().map(|m| m.id.as_ref().unwrap().as_str().to_string()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn live_only_messages_survive_a_history_load() {
        let mut s = session();
        let me = UserId::from("me");
        let seq = 1;
        s.begin_history_load(seq);

        s.apply_push(confirmed("m9", "u2", "fresh"), &me);
        s.apply_history(seq, vec![confirmed("m1", "u2", "old")]);

        let ids: Vec<_> =
            s.messages().iter().map(|m| m.id.as_ref().unwrap().as_str().to_string()).collect();
        assert_eq!(ids, vec!["m1", "m9"]);
    }

    #[test]
    fn stale_history_result_is_discarded() {
        let mut s = session();
        let old_seq = 1;
        s.begin_history_load(old_seq);
        s.begin_history_load(2);

        assert!(!s.apply_history(old_seq, vec![confirmed("m1", "u2", "stale")]));
        assert!(s.messages().is_empty());
        assert_eq!(*s.history(), HistoryState::Loading);
    }

    #[test]
    fn history_failure_keeps_the_sequence() {
        let mut s = session();
        let me = UserId::from("me");
        let seq = 1;
        s.begin_history_load(seq);

        s.apply_push(confirmed("m1", "u2", "Hi"), &me);
        assert!(s.history_failed(seq, "503"));

        assert_eq!(*s.history(), HistoryState::Failed("503".to_string()));
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn own_echo_reconciles_the_optimistic_entry() {
        let mut s = session();
        let ctx = ctx();

        s.append_local(Message::local_echo(LocalEchoId(1), RoomId::from("app123"), &ctx, "Hello"));

        let mut echo = confirmed("m2", "me", "Hello");
        echo.sender_name = "Dana".to_string();
        assert!(s.apply_push(echo, &ctx.user_id));

        assert_eq!(s.messages().len(), 1);
        let entry = &s.messages()[0];
        assert_eq!(entry.id, Some(MessageId::from("m2")));
        assert_eq!(entry.local_id, Some(LocalEchoId(1)));
        assert!(entry.created_at.is_some());
    }

    #[test]
    fn example_scenario_yields_exactly_two_messages() {
        // History has m1; user sends "Hello"; echo m2 arrives.
        let mut s = session();
        let ctx = ctx();
        let seq = 1;
        s.begin_history_load(seq);

        s.apply_history(seq, vec![confirmed("m1", "u2", "Hi")]);
        s.append_local(Message::local_echo(LocalEchoId(1), RoomId::from("app123"), &ctx, "Hello"));
        s.apply_push(confirmed("m2", "me", "Hello"), &ctx.user_id);

        assert_eq!(s.messages().len(), 2);
    }

    #[test]
    fn echo_then_durable_confirmation_only_upgrades_delivery() {
        let mut s = session();
        let ctx = ctx();

        s.append_local(Message::local_echo(LocalEchoId(1), RoomId::from("app123"), &ctx, "Hello"));
        s.apply_push(confirmed("m2", "me", "Hello"), &ctx.user_id);

        assert!(s.confirm_local(LocalEchoId(1), confirmed("m2", "me", "Hello")));
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].delivery, Delivery::Sent);
    }

    #[test]
    fn durable_confirmation_then_echo_deduplicates() {
        let mut s = session();
        let ctx = ctx();

        s.append_local(Message::local_echo(LocalEchoId(1), RoomId::from("app123"), &ctx, "Hello"));
        assert!(s.confirm_local(LocalEchoId(1), confirmed("m2", "me", "Hello")));

        // The live echo arrives second and must not duplicate.
        assert!(!s.apply_push(confirmed("m2", "me", "Hello"), &ctx.user_id));
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].id, Some(MessageId::from("m2")));
    }

    #[test]
    fn failed_durable_write_flags_but_keeps_the_entry() {
        let mut s = session();
        let ctx = ctx();

        s.append_local(Message::local_echo(LocalEchoId(1), RoomId::from("app123"), &ctx, "Hello"));
        assert!(s.fail_local(LocalEchoId(1), "timeout"));

        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].delivery, Delivery::Failed("timeout".to_string()));
    }

    proptest! {
        /// Any interleaving of pushes keeps ids unique and preserves the
        /// relative arrival order of first occurrences.
        #[test]
        fn push_merge_is_duplicate_free_and_order_preserving(
            ids in proptest::collection::vec(0u8..20, 0..60)
        ) {
            let mut s = session();
            let me = UserId::from("me");
            let mut expected = Vec::new();

            for id in ids {
                let key = format!("m{id}");
                if !expected.contains(&key) {
                    expected.push(key.clone());
                }
                s.apply_push(confirmed(&key, "u2", "text"), &me);
            }

            let got: Vec<_> = s
                .messages()
                .iter()
                .map(|m| m.id.as_ref().unwrap().as_str().to_string())
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
