//! Async orchestration loop.
//!
//! [`ChatDriver`] wires the sans-IO [`ChatEngine`] to real I/O: it owns
//! the [`ConnectionManager`], executes the engine's actions against the
//! socket and the [`RestClient`], and feeds their results back in as
//! events. Callers talk to it over channels: [`ChatCommand`] in,
//! [`ChatUpdate`] out.
//!
//! The driver reconnects with exponential backoff when the socket
//! drops; the engine rejoins its rooms on every reconnect.

use std::{sync::Arc, time::Duration};

use pawlink_core::{ChatError, RoomId, RoomSession, SessionContext};
use pawlink_proto::{ClientFrame, ServerFrame};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    engine::ChatEngine,
    event::{ChatAction, ChatEvent},
    rest::RestClient,
    transport::ConnectionManager,
};

const CHANNEL_CAPACITY: usize = 64;

/// Reconnect tuning for the driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Backoff before the first reconnect attempt.
    pub reconnect_initial: Duration,
    /// Backoff ceiling; doubling stops here.
    pub reconnect_max: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

/// Commands the application sends to the driver.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Open a room and start its history load.
    OpenRoom(RoomId),
    /// Close a room and leave it on the live channel.
    CloseRoom(RoomId),
    /// Send a message to an open room.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Raw composer text.
        text: String,
    },
    /// Retry a failed history load for an open room.
    RetryHistory(RoomId),
    /// Leave all rooms and stop the driver.
    Shutdown,
}

/// State updates the driver publishes to the application.
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    /// A room's session state changed; render from this snapshot.
    RoomChanged {
        /// Room the snapshot belongs to.
        room_id: RoomId,
        /// Full session state after the change.
        session: RoomSession,
    },
    /// A room was closed and its state discarded.
    RoomClosed {
        /// Room that was torn down.
        room_id: RoomId,
    },
    /// The engine rejected an event.
    EngineError {
        /// Why the event was rejected.
        error: ChatError,
    },
    /// A connection attempt failed; the driver is backing off.
    ///
    /// Non-blocking: room state stays rendered and a retry is already
    /// scheduled.
    ConnectFailed {
        /// The connection failure.
        error: ChatError,
    },
}

/// What the select loop saw this iteration.
enum Step {
    Command(Option<ChatCommand>),
    Inbound(Option<ServerFrame>),
    Feedback(Option<ChatEvent>),
}

/// Drives the engine against a live socket and the REST API.
pub struct ChatDriver {
    engine: ChatEngine,
    manager: ConnectionManager,
    rest: Arc<RestClient>,
    config: DriverConfig,
    commands: mpsc::Receiver<ChatCommand>,
    updates: mpsc::Sender<ChatUpdate>,
    feedback_tx: mpsc::Sender<ChatEvent>,
    feedback_rx: mpsc::Receiver<ChatEvent>,
}

impl ChatDriver {
    /// Create a driver with default tuning and the channel endpoints the
    /// application keeps.
    pub fn new(
        ctx: SessionContext,
        ws_url: impl Into<String>,
        rest: RestClient,
    ) -> (Self, mpsc::Sender<ChatCommand>, mpsc::Receiver<ChatUpdate>) {
        Self::with_config(ctx, ws_url, rest, DriverConfig::default())
    }

    /// Create a driver with explicit reconnect tuning.
    pub fn with_config(
        ctx: SessionContext,
        ws_url: impl Into<String>,
        rest: RestClient,
        config: DriverConfig,
    ) -> (Self, mpsc::Sender<ChatCommand>, mpsc::Receiver<ChatUpdate>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (update_tx, update_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (feedback_tx, feedback_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let driver = Self {
            engine: ChatEngine::new(ctx),
            manager: ConnectionManager::new(ws_url),
            rest: Arc::new(rest),
            config,
            commands: command_rx,
            updates: update_tx,
            feedback_tx,
            feedback_rx,
        };
        (driver, command_tx, update_rx)
    }

    /// Run until [`ChatCommand::Shutdown`] or the command channel drops.
    pub async fn run(mut self) {
        let mut backoff = self.config.reconnect_initial;

        'outer: loop {
            let to_server = match self.manager.get_or_create().await {
                Ok(socket) => socket.to_server.clone(),
                Err(e) => {
                    warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "connect failed");
                    let error = ChatError::Connection { reason: e.to_string() };
                    let _ = self.updates.send(ChatUpdate::ConnectFailed { error }).await;
                    if self.wait_offline(backoff).await {
                        break;
                    }
                    backoff = (backoff * 2).min(self.config.reconnect_max);
                    continue;
                },
            };
            backoff = self.config.reconnect_initial;
            self.dispatch(ChatEvent::SocketConnected, Some(&to_server)).await;

            loop {
                let step = tokio::select! {
                    command = self.commands.recv() => Step::Command(command),
                    frame = self.manager.recv() => Step::Inbound(frame),
                    event = self.feedback_rx.recv() => Step::Feedback(event),
                };

                match step {
                    Step::Command(None) => break 'outer,
                    Step::Command(Some(command)) => {
                        if self.handle_command(command, Some(&to_server)).await {
                            break 'outer;
                        }
                    },
                    Step::Inbound(Some(ServerFrame::ReceiveMessage(message))) => {
                        self.dispatch(ChatEvent::PushReceived(message), Some(&to_server)).await;
                    },
                    Step::Inbound(None) => {
                        self.dispatch(ChatEvent::SocketDisconnected, None).await;
                        continue 'outer;
                    },
                    Step::Feedback(Some(event)) => {
                        self.dispatch(event, Some(&to_server)).await;
                    },
                    // We hold a feedback sender, so this cannot close.
                    Step::Feedback(None) => {},
                }
            }
        }

        self.manager.disconnect();
        debug!("driver stopped");
    }

    /// Wait out a reconnect backoff, still serving commands and REST
    /// results.
    ///
    /// Open/close/send still apply while offline; the engine defers the
    /// socket work until the next connect. History and durable-write
    /// results are independent of the socket, so they are dispatched
    /// here too instead of queuing until a connect succeeds. Returns
    /// `true` on shutdown.
    async fn wait_offline(&mut self, backoff: Duration) -> bool {
        let deadline = tokio::time::sleep(backoff);
        tokio::pin!(deadline);

        loop {
            let step = tokio::select! {
                () = &mut deadline => return false,
                command = self.commands.recv() => Step::Command(command),
                event = self.feedback_rx.recv() => Step::Feedback(event),
            };
            match step {
                Step::Command(None) => return true,
                Step::Command(Some(command)) => {
                    if self.handle_command(command, None).await {
                        return true;
                    }
                },
                Step::Feedback(Some(event)) => {
                    self.dispatch(event, None).await;
                },
                // The socket is not polled while offline.
                Step::Feedback(None) | Step::Inbound(_) => {},
            }
        }
    }

    /// Translate a command into engine events. Returns `true` on
    /// shutdown.
    async fn handle_command(
        &mut self,
        command: ChatCommand,
        to_server: Option<&mpsc::Sender<ClientFrame>>,
    ) -> bool {
        match command {
            ChatCommand::OpenRoom(room_id) => {
                self.dispatch(ChatEvent::OpenRoom { room_id }, to_server).await;
                false
            },
            ChatCommand::CloseRoom(room_id) => {
                self.dispatch(ChatEvent::CloseRoom { room_id }, to_server).await;
                false
            },
            ChatCommand::SendMessage { room_id, text } => {
                self.dispatch(ChatEvent::SendMessage { room_id, text }, to_server).await;
                false
            },
            ChatCommand::RetryHistory(room_id) => {
                self.dispatch(ChatEvent::RetryHistory { room_id }, to_server).await;
                false
            },
            ChatCommand::Shutdown => {
                // Best-effort leaves before the socket goes away.
                for room_id in self.engine.open_rooms() {
                    self.dispatch(ChatEvent::CloseRoom { room_id }, to_server).await;
                }
                true
            },
        }
    }

    /// Feed one event through the engine, execute its actions, and
    /// publish snapshots for the rooms it touched.
    async fn dispatch(
        &mut self,
        event: ChatEvent,
        to_server: Option<&mpsc::Sender<ClientFrame>>,
    ) {
        let touched = touched_rooms(&event, &self.engine);

        match self.engine.handle(event) {
            Ok(actions) => {
                for action in actions {
                    self.execute(action, to_server).await;
                }
            },
            Err(error) => {
                warn!(error = %error, "engine rejected event");
                let _ = self.updates.send(ChatUpdate::EngineError { error }).await;
                return;
            },
        }

        for room_id in touched {
            let update = match self.engine.room(&room_id) {
                Some(session) => {
                    ChatUpdate::RoomChanged { room_id, session: session.clone() }
                },
                None => ChatUpdate::RoomClosed { room_id },
            };
            let _ = self.updates.send(update).await;
        }
    }

    /// Execute one engine action.
    async fn execute(&mut self, action: ChatAction, to_server: Option<&mpsc::Sender<ClientFrame>>) {
        match action {
            ChatAction::Emit(frame) => match to_server {
                // Best-effort; the engine rejoins on reconnect anyway.
                Some(tx) => {
                    if tx.send(frame).await.is_err() {
                        warn!("socket gone, frame dropped");
                    }
                },
                None => warn!("no live socket, frame dropped"),
            },
            ChatAction::LoadHistory { room_id, seq } => {
                let rest = Arc::clone(&self.rest);
                let feedback = self.feedback_tx.clone();
                tokio::spawn(async move {
                    let event = match rest.fetch_history(&room_id).await {
                        Ok(messages) => ChatEvent::HistoryLoaded { room_id, seq, messages },
                        Err(error) => ChatEvent::HistoryFailed { room_id, seq, error },
                    };
                    let _ = feedback.send(event).await;
                });
            },
            ChatAction::PostMessage { room_id, local_id, payload } => {
                let rest = Arc::clone(&self.rest);
                let feedback = self.feedback_tx.clone();
                tokio::spawn(async move {
                    let event = match rest.post_message(&payload).await {
                        Ok(message) => {
                            ChatEvent::DurableWriteConfirmed { room_id, local_id, message }
                        },
                        Err(error) => ChatEvent::DurableWriteFailed { room_id, local_id, error },
                    };
                    let _ = feedback.send(event).await;
                });
            },
            ChatAction::Log { message } => debug!("{message}"),
        }
    }
}

/// Rooms whose session state an event can change.
fn touched_rooms(event: &ChatEvent, engine: &ChatEngine) -> Vec<RoomId> {
    match event {
        ChatEvent::OpenRoom { room_id }
        | ChatEvent::CloseRoom { room_id }
        | ChatEvent::SendMessage { room_id, .. }
        | ChatEvent::RetryHistory { room_id }
        | ChatEvent::HistoryLoaded { room_id, .. }
        | ChatEvent::HistoryFailed { room_id, .. }
        | ChatEvent::DurableWriteConfirmed { room_id, .. }
        | ChatEvent::DurableWriteFailed { room_id, .. } => vec![room_id.clone()],
        ChatEvent::PushReceived(wire) => vec![RoomId::from(wire.application.as_str())],
        ChatEvent::SocketConnected | ChatEvent::SocketDisconnected => engine.open_rooms(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pawlink_core::{AuthToken, HistoryState, UserId};
    use tokio::time::timeout;

    use super::*;

    fn ctx() -> SessionContext {
        SessionContext {
            user_id: UserId::from("me"),
            display_name: "Dana".to_string(),
            token: Some(AuthToken::new("tok")),
        }
    }

    /// Nothing listens on port 1, so both the socket dial and the REST
    /// call fail fast while the long backoff keeps the driver offline.
    #[tokio::test]
    async fn history_results_apply_while_the_socket_is_down() {
        let rest = RestClient::new("http://127.0.0.1:1", Some(AuthToken::new("tok")));
        let config = DriverConfig {
            reconnect_initial: Duration::from_secs(30),
            reconnect_max: Duration::from_secs(30),
        };
        let (driver, commands, mut updates) =
            ChatDriver::with_config(ctx(), "ws://127.0.0.1:1", rest, config);
        let handle = tokio::spawn(driver.run());

        commands.send(ChatCommand::OpenRoom(RoomId::from("app1"))).await.unwrap();

        // The failed fetch must surface as room state during the backoff,
        // not sit queued until a connect succeeds.
        let saw_failed_history = timeout(Duration::from_secs(5), async {
            loop {
                match updates.recv().await {
                    Some(ChatUpdate::RoomChanged { session, .. }) => {
                        if matches!(session.history(), HistoryState::Failed(_)) {
                            break true;
                        }
                    },
                    Some(_) => {},
                    None => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(saw_failed_history);

        commands.send(ChatCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }
}
