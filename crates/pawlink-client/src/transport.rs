//! WebSocket transport for the live channel.
//!
//! Provides [`ConnectionManager`], which owns the single shared socket
//! for the whole session, and [`LiveSocket`], the channel-based handle
//! to one connection. This is a thin layer that just sends/receives
//! frames; protocol logic remains in the sans-IO [`ChatEngine`].
//!
//! [`ChatEngine`]: crate::ChatEngine

use futures_util::{SinkExt, StreamExt};
use pawlink_proto::{ClientFrame, ServerFrame};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The connection dropped mid-stream.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Handle to one live WebSocket connection.
///
/// Frames are sent/received via the channels; an internal task handles
/// the socket I/O. Dropping the handle without calling [`stop`] leaves
/// the task running until the socket closes on its own.
///
/// [`stop`]: LiveSocket::stop
pub struct LiveSocket {
    /// Send frames to the server.
    pub to_server: mpsc::Sender<ClientFrame>,
    /// Receive frames from the server.
    pub from_server: mpsc::Receiver<ServerFrame>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl LiveSocket {
    /// Stop the connection task.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    /// Whether the connection task is still running.
    ///
    /// The task exits when the socket closes, so a finished task means
    /// the connection is gone even if the handle is still held.
    pub fn is_open(&self) -> bool {
        !self.abort_handle.is_finished() && !self.to_server.is_closed()
    }
}

/// Connect to the chat backend's WebSocket endpoint.
pub async fn connect(url: &str) -> Result<LiveSocket, TransportError> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("websocket connect failed: {e}")))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<ClientFrame>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<ServerFrame>(32);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(LiveSocket {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Run the connection, bridging between channels and the socket.
///
/// Exits when the socket closes, errors, or the outbound channel is
/// dropped. Unknown or malformed inbound frames are logged and skipped
/// rather than tearing the connection down.
async fn run_connection<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    mut to_server: mpsc::Receiver<ClientFrame>,
    from_server: mpsc::Sender<ServerFrame>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outbound = to_server.recv() => {
                let Some(frame) = outbound else {
                    debug!("outbound channel closed, shutting socket down");
                    let _ = sink.close().await;
                    break;
                };
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "dropping unencodable frame");
                        continue;
                    },
                };
                if let Err(e) = sink.send(WsMessage::text(text)).await {
                    warn!(error = %e, "socket write failed");
                    break;
                }
            },
            inbound = source.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match ServerFrame::decode(&text) {
                            Ok(frame) => {
                                if from_server.send(frame).await.is_err() {
                                    debug!("inbound channel closed, stopping");
                                    break;
                                }
                            },
                            Err(e) => {
                                warn!(error = %e, "skipping undecodable frame");
                            },
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("server closed the socket");
                        break;
                    },
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry no chat events.
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "socket read failed");
                        break;
                    },
                }
            },
        }
    }
}

/// Owner of the single shared socket for the session.
///
/// Every room multiplexes over one connection; opening a second room
/// reuses the live socket instead of dialing again. Reconnecting after
/// a drop replaces the handle, and the caller re-reports the lifecycle
/// to the engine so it can rejoin its rooms.
pub struct ConnectionManager {
    url: String,
    current: Option<LiveSocket>,
}

impl ConnectionManager {
    /// Create a manager dialing the given WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), current: None }
    }

    /// Whether a connection is currently live.
    pub fn is_connected(&self) -> bool {
        self.current.as_ref().is_some_and(LiveSocket::is_open)
    }

    /// Get the live socket, dialing if none is open.
    ///
    /// A dead handle from a previous connection is stopped and replaced.
    pub async fn get_or_create(&mut self) -> Result<&mut LiveSocket, TransportError> {
        let reusable = self.current.as_ref().is_some_and(LiveSocket::is_open);
        if !reusable {
            if let Some(old) = self.current.take() {
                old.stop();
            }
            self.current = Some(connect(&self.url).await?);
        }
        self.current
            .as_mut()
            .ok_or_else(|| TransportError::Connection("no live socket".to_string()))
    }

    /// Receive the next inbound frame on the current connection.
    ///
    /// Returns `None` when no connection is live or when the current
    /// one closes.
    pub async fn recv(&mut self) -> Option<ServerFrame> {
        match self.current.as_mut() {
            Some(socket) => socket.from_server.recv().await,
            None => None,
        }
    }

    /// Tear down the current connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(socket) = self.current.take() {
            socket.stop();
        }
    }
}
