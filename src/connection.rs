//! Connection manager: connection state and the background transport loop.
//!
//! One loop task owns one [`Transport`]. It multiplexes outbound commands,
//! inbound server messages, the shutdown signal, and two timers with
//! `tokio::select!`:
//!
//! - the **connect deadline**, which forces `Connecting → Failed` when the
//!   server's `connect` handshake does not arrive in time;
//! - the **request deadline**, armed when a `create-room` / `join-room` is
//!   sent, which abandons the request if no confirmation arrives.
//!
//! Messages are processed strictly in arrival order. The loop and the client
//! handle share [`SharedState`] behind a mutex that is never held across an
//! `.await`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::event::IntruderEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::RoomSession;
use crate::transport::Transport;

// ── ConnectionState ─────────────────────────────────────────────────

/// Lifecycle of the connection to the room server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Transport opened (or being dialed); waiting for the `connect` handshake.
    #[default]
    Connecting,
    /// Handshake complete; intents may be dispatched.
    Connected,
    /// An established connection ended, or the client disconnected.
    Disconnected,
    /// The connection never became `Connected`.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Returns `true` once no further transitions can happen on this connection.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared by the client handle and the transport loop.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) connection: ConnectionState,
    pub(crate) session: RoomSession,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lock the state. A poisoned lock is recovered: every critical section
    /// leaves the state machine consistent before it can panic.
    pub(crate) fn lock(cell: &Mutex<Self>) -> MutexGuard<'_, Self> {
        cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_connection(&mut self, next: ConnectionState) {
        if self.connection != next {
            debug!(from = %self.connection, to = %next, "connection state changed");
            self.connection = next;
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Everything the loop needs besides the transport.
pub(crate) struct LoopContext {
    pub(crate) cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    pub(crate) event_tx: mpsc::Sender<IntruderEvent>,
    pub(crate) shared: Arc<Mutex<SharedState>>,
    pub(crate) shutdown_rx: oneshot::Receiver<()>,
    pub(crate) connect_deadline: Instant,
    pub(crate) request_timeout: Option<Duration>,
}

/// Why the loop stopped.
#[derive(Debug)]
enum Ending {
    /// The client asked to disconnect or dropped its handle.
    Shutdown,
    /// The transport or the server ended the connection.
    Lost(Option<String>),
    /// The handshake was refused or never arrived.
    ConnectFailed(String),
}

/// Outcome of one inbound message.
enum Step {
    Emit(Option<IntruderEvent>),
    Connected(IntruderEvent),
    Stop(Ending),
}

/// Run the transport loop until shutdown, transport loss or handshake failure.
///
/// The last event sent is always `Disconnected` or `ConnectFailed`; the event
/// channel closes when this function returns.
pub(crate) async fn run(mut transport: impl Transport, ctx: LoopContext) {
    let LoopContext {
        mut cmd_rx,
        event_tx,
        shared,
        mut shutdown_rx,
        connect_deadline,
        request_timeout,
    } = ctx;
    let mut connect_deadline = Some(connect_deadline);
    let mut request_deadline: Option<Instant> = None;

    debug!("transport loop started");

    let ending = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(msg) = cmd else {
                    debug!("command channel closed, shutting down transport loop");
                    let _ = transport.close().await;
                    break Ending::Shutdown;
                };
                debug!(event = msg.event_name(), "sending client message");
                let json = match encode(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("failed to encode {}: {e}", msg.event_name());
                        continue;
                    }
                };
                if let Err(e) = transport.send(json).await {
                    error!("transport send error: {e}");
                    break Ending::Lost(Some(format!("transport send error: {e}")));
                }
                match msg {
                    ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => {
                        SharedState::lock(&shared).session.mark_request_sent();
                        request_deadline = request_timeout.map(|timeout| Instant::now() + timeout);
                    }
                    ClientMessage::LeaveRoom { .. } => request_deadline = None,
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                break Ending::Shutdown;
            }

            () = sleep_until_opt(connect_deadline), if connect_deadline.is_some() => {
                warn!("no connect handshake before the connect timeout");
                let _ = transport.close().await;
                break Ending::ConnectFailed("timed out waiting for the server handshake".into());
            }

            () = sleep_until_opt(request_deadline), if request_deadline.is_some() => {
                request_deadline = None;
                let aborted = SharedState::lock(&shared).session.abort_pending();
                if let Some(request) = aborted {
                    warn!(?request, "no reply to room request before the request timeout");
                    emit_event(&event_tx, IntruderEvent::RequestTimedOut { request }).await;
                }
            }

            incoming = transport.recv() => {
                let text = match incoming {
                    Some(Ok(text)) => text,
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        break Ending::Lost(Some(format!("transport receive error: {e}")));
                    }
                    None => {
                        debug!("transport closed by server");
                        break Ending::Lost(None);
                    }
                };
                let msg = match decode(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("failed to decode server message: {e}, raw: {text}");
                        continue;
                    }
                };

                match handle_server_message(&shared, msg) {
                    Step::Emit(event) => {
                        if let Some(event) = event {
                            emit_event(&event_tx, event).await;
                        }
                    }
                    Step::Connected(event) => {
                        connect_deadline = None;
                        emit_event(&event_tx, event).await;
                    }
                    Step::Stop(ending) => {
                        let _ = transport.close().await;
                        break ending;
                    }
                }

                if !SharedState::lock(&shared).session.is_pending() {
                    request_deadline = None;
                }
            }
        }
    };

    finish(&event_tx, &shared, ending).await;
    debug!("transport loop exited");
}

fn encode(msg: &ClientMessage) -> Result<String> {
    Ok(serde_json::to_string(msg)?)
}

fn decode(text: &str) -> Result<ServerMessage> {
    Ok(serde_json::from_str(text)?)
}

/// Apply one inbound message to the shared state.
fn handle_server_message(shared: &Mutex<SharedState>, msg: ServerMessage) -> Step {
    let mut state = SharedState::lock(shared);
    match msg {
        ServerMessage::Connect { connection_id } => {
            let id = connection_id.as_deref().unwrap_or("none");
            if state.connection == ConnectionState::Connecting {
                info!(connection_id = id, "connected to room server");
                state.set_connection(ConnectionState::Connected);
            } else {
                warn!(connection_id = id, "repeated connect handshake");
            }
            state.session.set_connection_id(connection_id.clone());
            Step::Connected(IntruderEvent::Connected { connection_id })
        }
        ServerMessage::ConnectError { message } => {
            let message = if message.is_empty() {
                "connection refused by server".to_string()
            } else {
                message
            };
            warn!("server refused the connection: {message}");
            if state.connection == ConnectionState::Connecting {
                Step::Stop(Ending::ConnectFailed(message))
            } else {
                Step::Stop(Ending::Lost(Some(message)))
            }
        }
        ServerMessage::Disconnect { reason } => {
            info!(reason = reason.as_deref().unwrap_or("none"), "server disconnected us");
            Step::Stop(Ending::Lost(reason))
        }
        other => {
            if !state.connection.is_connected() {
                warn!(event = other.event_name(), "message before handshake ignored");
                return Step::Emit(None);
            }
            let applied = state.session.apply(&other);
            Step::Emit(IntruderEvent::from_applied(applied, &state.session))
        }
    }
}

/// Move to the terminal state, clear the session and send the final event.
async fn finish(event_tx: &mpsc::Sender<IntruderEvent>, shared: &Mutex<SharedState>, ending: Ending) {
    let event = {
        let mut state = SharedState::lock(shared);
        let was = state.connection;
        if let Some(request) = state.session.connection_lost() {
            debug!(?request, "pending request dropped with the connection");
        }

        match ending {
            Ending::ConnectFailed(reason) => {
                state.set_connection(ConnectionState::Failed);
                IntruderEvent::ConnectFailed { reason }
            }
            Ending::Lost(reason) if was == ConnectionState::Connecting => {
                state.set_connection(ConnectionState::Failed);
                IntruderEvent::ConnectFailed {
                    reason: reason.unwrap_or_else(|| "connection closed before handshake".into()),
                }
            }
            Ending::Lost(reason) => {
                state.set_connection(ConnectionState::Disconnected);
                IntruderEvent::Disconnected { reason }
            }
            Ending::Shutdown => {
                state.set_connection(ConnectionState::Disconnected);
                IntruderEvent::Disconnected {
                    reason: Some("client disconnected".into()),
                }
            }
        }
    };
    emit_terminal(event_tx, event).await;
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Emit an event. If the channel is full, log a warning and drop the event
/// rather than stall the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<IntruderEvent>, event: IntruderEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final event of a connection. Waits for capacity so it is never dropped.
async fn emit_terminal(event_tx: &mpsc::Sender<IntruderEvent>, event: IntruderEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::Player;
    use crate::session::SessionPhase;

    fn connected_state() -> Mutex<SharedState> {
        let shared = Mutex::new(SharedState::new());
        let step = handle_server_message(
            &shared,
            ServerMessage::Connect {
                connection_id: Some("c1".into()),
            },
        );
        assert!(matches!(step, Step::Connected(_)));
        shared
    }

    #[test]
    fn state_defaults_to_connecting() {
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Failed.is_terminal());
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn handshake_records_connection_id() {
        let shared = connected_state();
        let state = SharedState::lock(&shared);
        assert_eq!(state.connection, ConnectionState::Connected);
        assert_eq!(state.session.connection_id(), Some("c1"));
    }

    #[test]
    fn room_events_before_handshake_are_ignored() {
        let shared = Mutex::new(SharedState::new());
        SharedState::lock(&shared).session.begin_join("bob", "AB12CD").unwrap();
        let step = handle_server_message(
            &shared,
            ServerMessage::RoomJoined {
                room_code: "AB12CD".into(),
                players: vec![Player::new("1", "alice")],
            },
        );
        assert!(matches!(step, Step::Emit(None)));
        assert!(matches!(
            SharedState::lock(&shared).session.phase(),
            SessionPhase::Joining { .. }
        ));
    }

    #[test]
    fn connect_error_while_connecting_is_a_connect_failure() {
        let shared = Mutex::new(SharedState::new());
        let step = handle_server_message(
            &shared,
            ServerMessage::ConnectError {
                message: "server full".into(),
            },
        );
        assert!(matches!(step, Step::Stop(Ending::ConnectFailed(ref m)) if m == "server full"));
    }

    #[test]
    fn handshake_without_connection_id_still_connects() {
        let shared = Mutex::new(SharedState::new());
        let step = handle_server_message(&shared, decode(r#"{"type":"connect"}"#).unwrap());
        assert!(matches!(
            step,
            Step::Connected(IntruderEvent::Connected { connection_id: None })
        ));
        let state = SharedState::lock(&shared);
        assert_eq!(state.connection, ConnectionState::Connected);
        assert!(state.session.connection_id().is_none());
    }

    #[test]
    fn bare_connect_error_gets_a_reason() {
        let shared = Mutex::new(SharedState::new());
        let step = handle_server_message(&shared, decode(r#"{"type":"connect-error"}"#).unwrap());
        assert!(matches!(
            step,
            Step::Stop(Ending::ConnectFailed(ref m)) if m == "connection refused by server"
        ));
    }

    #[test]
    fn bare_disconnect_while_joining_stops_the_loop() {
        let shared = connected_state();
        SharedState::lock(&shared).session.begin_join("bob", "AB12CD").unwrap();
        let step = handle_server_message(&shared, decode(r#"{"type":"disconnect"}"#).unwrap());
        assert!(matches!(step, Step::Stop(Ending::Lost(None))));
    }

    #[test]
    fn undecodable_frames_are_serialization_errors() {
        let err = decode("not json").unwrap_err();
        assert!(matches!(err, crate::error::IntruderError::Serialization(_)));
        let err = decode(r#"{"type":"game-start","data":{}}"#).unwrap_err();
        assert!(matches!(err, crate::error::IntruderError::Serialization(_)));
    }

    #[test]
    fn encode_writes_wire_json() {
        let json = encode(&ClientMessage::LeaveRoom {
            room_code: "AB12CD".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"leave-room","data":{"roomCode":"AB12CD"}}"#);
    }

    #[test]
    fn disconnect_stops_the_loop() {
        let shared = connected_state();
        let step = handle_server_message(&shared, ServerMessage::Disconnect { reason: None });
        assert!(matches!(step, Step::Stop(Ending::Lost(None))));
    }

    #[tokio::test]
    async fn finish_after_connected_emits_disconnected_and_clears_session() {
        let shared = connected_state();
        {
            let mut state = SharedState::lock(&shared);
            state.session.begin_create("alice").unwrap();
        }
        let (tx, mut rx) = mpsc::channel(1);
        finish(&tx, &shared, Ending::Lost(Some("gone".into()))).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            IntruderEvent::Disconnected {
                reason: Some("gone".into())
            }
        );
        let state = SharedState::lock(&shared);
        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(state.session.phase(), &SessionPhase::NoRoom);
        assert!(state.session.connection_id().is_none());
    }

    #[tokio::test]
    async fn loss_before_handshake_is_a_failure() {
        let shared = Mutex::new(SharedState::new());
        let (tx, mut rx) = mpsc::channel(1);
        finish(&tx, &shared, Ending::Lost(None)).await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            IntruderEvent::ConnectFailed { .. }
        ));
        assert_eq!(
            SharedState::lock(&shared).connection,
            ConnectionState::Failed
        );
    }

    #[tokio::test]
    async fn full_channel_drops_events_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let connected = |id: &str| IntruderEvent::Connected {
            connection_id: Some(id.into()),
        };
        emit_event(&tx, connected("a")).await;
        emit_event(&tx, connected("b")).await;
        assert_eq!(rx.recv().await.unwrap(), connected("a"));
        assert!(rx.try_recv().is_err());
    }
}
