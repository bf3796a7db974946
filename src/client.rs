//! Async client handle for the Image Intruder room server.
//!
//! [`IntruderClient`] is a thin handle over a background transport loop (see
//! [`connection`](crate::connection)). Intents are validated and applied to the
//! local session synchronously, then queued to the loop over an unbounded
//! channel; they never wait for the server. Results arrive as
//! [`IntruderEvent`]s on the bounded channel returned from
//! [`IntruderClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = IntruderConfig::from_env();
//! let (client, mut events) = IntruderClient::connect(config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         IntruderEvent::Connected { .. } => client.create_room("alice")?,
//!         IntruderEvent::RoomCreated { room_code, .. } => println!("share {room_code}"),
//!         IntruderEvent::Disconnected { .. } | IntruderEvent::ConnectFailed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::IntruderConfig;
use crate::connection::{self, ConnectionState, LoopContext, SharedState};
use crate::directory::RoomDirectory;
use crate::dispatch::{dispatch, Intent};
use crate::error::{IntruderError, Result};
use crate::error_codes::ErrorCode;
use crate::event::IntruderEvent;
use crate::protocol::{ClientMessage, Player};
use crate::room_code;
use crate::session::SessionSnapshot;
use crate::transport::Transport;

/// Handle to one connection attempt and its room session.
///
/// Created via [`IntruderClient::start`] (any [`Transport`]) or
/// [`IntruderClient::connect`] (WebSocket). Only one transport loop exists per
/// handle; [`restart`](Self::restart) and [`reconnect`](Self::reconnect) tear
/// the old one down first.
pub struct IntruderClient {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<Mutex<SharedState>>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    config: IntruderConfig,
}

impl IntruderClient {
    /// Start the transport loop over an already-open transport.
    ///
    /// The client starts in [`ConnectionState::Connecting`] and becomes
    /// `Connected` when the server's `connect` handshake arrives. If it does
    /// not arrive within `config.connect_timeout`, the connection fails.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The receiver yields
    /// [`IntruderEvent`]s until the connection ends; the last one is always
    /// `Disconnected` or `ConnectFailed`.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: IntruderConfig,
    ) -> (Self, mpsc::Receiver<IntruderEvent>) {
        Self::start_at(transport, config, Instant::now())
    }

    /// Dial the configured server over WebSocket and start the client.
    ///
    /// The dial and the handshake share one `connect_timeout` budget.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidUrl`] for an unusable server URL,
    /// [`IntruderError::Timeout`] if the dial does not finish in time, and the
    /// transport's own errors otherwise. No client is created on failure.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(config: IntruderConfig) -> Result<(Self, mpsc::Receiver<IntruderEvent>)> {
        let started = Instant::now();
        let transport = dial(&config).await?;
        Ok(Self::start_at(transport, config, started))
    }

    fn start_at(
        transport: impl Transport,
        config: IntruderConfig,
        started: Instant,
    ) -> (Self, mpsc::Receiver<IntruderEvent>) {
        let shared = Arc::new(Mutex::new(SharedState::new()));
        let (cmd_tx, task, shutdown_tx, events) =
            spawn_loop(transport, &config, Arc::clone(&shared), started);
        let client = Self {
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            config,
        };
        (client, events)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Ask the server for a new room. This client becomes its host.
    ///
    /// # Errors
    ///
    /// [`IntruderError::NotConnected`] before the handshake or after the
    /// connection ended, [`IntruderError::InvalidInput`] for a blank name,
    /// [`IntruderError::InvalidState`] unless the session is in `NoRoom`.
    pub fn create_room(&self, display_name: &str) -> Result<()> {
        self.submit(Intent::CreateRoom {
            display_name: display_name.to_string(),
            room_code: None,
        })
    }

    /// Like [`create_room`](Self::create_room), proposing `room_code`.
    /// Use [`room_code::generate`] for a fresh proposal.
    ///
    /// # Errors
    ///
    /// Same as [`create_room`](Self::create_room).
    pub fn create_room_with_code(&self, display_name: &str, room_code: &str) -> Result<()> {
        self.submit(Intent::CreateRoom {
            display_name: display_name.to_string(),
            room_code: Some(room_code.to_string()),
        })
    }

    /// Join an existing room by code. The code is trimmed and uppercased.
    ///
    /// # Errors
    ///
    /// [`IntruderError::NotConnected`], [`IntruderError::InvalidInput`] for a
    /// blank name or code, [`IntruderError::InvalidState`] unless in `NoRoom`.
    pub fn join_room(&self, display_name: &str, room_code: &str) -> Result<()> {
        self.submit(Intent::JoinRoom {
            display_name: display_name.to_string(),
            room_code: room_code.to_string(),
        })
    }

    /// Leave the current room. The local session resets immediately; the
    /// server is told best-effort and no acknowledgment is awaited.
    ///
    /// # Errors
    ///
    /// [`IntruderError::NotConnected`], or [`IntruderError::InvalidState`]
    /// unless the session is in a room.
    pub fn leave_room(&self) -> Result<()> {
        self.submit(Intent::LeaveRoom)
    }

    /// Set the name used for the next create/join. Works offline.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidInput`] for a blank name.
    pub fn set_display_name(&self, display_name: &str) -> Result<()> {
        self.submit(Intent::SetDisplayName(display_name.to_string()))
    }

    /// Join `room_code` after checking that the directory lists it.
    ///
    /// # Errors
    ///
    /// Everything [`join_room`](Self::join_room) returns, directory errors, and
    /// [`IntruderError::Protocol`] with [`ErrorCode::RoomNotFound`] when the
    /// room is not listed.
    pub async fn join_listed_room<D>(
        &self,
        directory: &D,
        display_name: &str,
        room_code: &str,
    ) -> Result<()>
    where
        D: RoomDirectory + ?Sized,
    {
        if !self.is_connected() {
            return Err(IntruderError::NotConnected);
        }
        if display_name.trim().is_empty() {
            return Err(IntruderError::InvalidInput(
                "display name must not be blank".into(),
            ));
        }
        let code = room_code::normalize(room_code)
            .ok_or_else(|| IntruderError::InvalidInput("room code must not be blank".into()))?;

        if !directory.room_exists(&code).await? {
            debug!(room = %code, "room not listed, join skipped");
            return Err(IntruderError::Protocol {
                message: format!("room {code} does not exist"),
                error_code: Some(ErrorCode::RoomNotFound),
            });
        }
        self.join_room(display_name, &code)
    }

    /// Whether the room this client is in already shows up in the directory.
    /// `false` when not in a room.
    ///
    /// # Errors
    ///
    /// Directory errors.
    pub async fn created_room_is_listed<D>(&self, directory: &D) -> Result<bool>
    where
        D: RoomDirectory + ?Sized,
    {
        match self.room_code() {
            Some(code) => directory.room_exists(&code).await,
            None => Ok(false),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Close the connection and stop the transport loop.
    ///
    /// Idempotent. The event receiver yields the final `Disconnected` event
    /// and then `None`.
    pub async fn disconnect(&mut self) {
        if self.task.is_none() {
            return;
        }
        debug!("IntruderClient: disconnect requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        // An aborted loop never reached its own cleanup.
        let mut state = SharedState::lock(&self.shared);
        if !state.connection.is_terminal() {
            state.set_connection(ConnectionState::Disconnected);
        }
        state.session.connection_lost();
    }

    /// Tear down the current connection and start over on `transport`.
    ///
    /// The previous event receiver ends; events for the new connection arrive
    /// on the returned one. The display name carries over.
    #[must_use = "the event receiver must be used to receive events"]
    pub async fn restart(&mut self, transport: impl Transport) -> mpsc::Receiver<IntruderEvent> {
        self.disconnect().await;
        self.restart_at(transport, Instant::now())
    }

    /// Tear down the current connection and dial the configured server again.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect). On failure the client stays
    /// in [`ConnectionState::Failed`].
    #[cfg(feature = "transport-websocket")]
    pub async fn reconnect(&mut self) -> Result<mpsc::Receiver<IntruderEvent>> {
        self.disconnect().await;
        let started = Instant::now();
        match dial(&self.config).await {
            Ok(transport) => Ok(self.restart_at(transport, started)),
            Err(e) => {
                SharedState::lock(&self.shared).set_connection(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    fn restart_at(
        &mut self,
        transport: impl Transport,
        started: Instant,
    ) -> mpsc::Receiver<IntruderEvent> {
        SharedState::lock(&self.shared).set_connection(ConnectionState::Connecting);
        let (cmd_tx, task, shutdown_tx, events) =
            spawn_loop(transport, &self.config, Arc::clone(&self.shared), started);
        self.cmd_tx = cmd_tx;
        self.task = Some(task);
        self.shutdown_tx = Some(shutdown_tx);
        events
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        SharedState::lock(&self.shared).connection
    }

    /// Returns `true` once the handshake completed and until the connection ends.
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// A copy of the current room session.
    pub fn session(&self) -> SessionSnapshot {
        SharedState::lock(&self.shared).session.snapshot()
    }

    pub fn is_host(&self) -> bool {
        SharedState::lock(&self.shared).session.is_host()
    }

    pub fn room_code(&self) -> Option<String> {
        SharedState::lock(&self.shared)
            .session
            .room_code()
            .map(str::to_string)
    }

    pub fn players(&self) -> Vec<Player> {
        SharedState::lock(&self.shared).session.players().to_vec()
    }

    /// The identifier the server assigned in the handshake.
    pub fn connection_id(&self) -> Option<String> {
        SharedState::lock(&self.shared)
            .session
            .connection_id()
            .map(str::to_string)
    }

    pub fn config(&self) -> &IntruderConfig {
        &self.config
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Dispatch an intent and queue its message while holding the state lock,
    /// so outbound order matches transition order.
    fn submit(&self, intent: Intent) -> Result<()> {
        let mut state = SharedState::lock(&self.shared);
        let before = state.session.clone();
        let Some(msg) = dispatch(&mut state, intent)? else {
            return Ok(());
        };
        if self.cmd_tx.send(msg).is_err() {
            state.session = before;
            return Err(IntruderError::NotConnected);
        }
        Ok(())
    }
}

impl std::fmt::Debug for IntruderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = SharedState::lock(&self.shared);
        f.debug_struct("IntruderClient")
            .field("connection", &state.connection)
            .field("phase", state.session.phase())
            .field("room_code", &state.session.room_code())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for IntruderClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close here; abort the loop instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type LoopParts = (
    mpsc::UnboundedSender<ClientMessage>,
    JoinHandle<()>,
    oneshot::Sender<()>,
    mpsc::Receiver<IntruderEvent>,
);

fn spawn_loop(
    transport: impl Transport,
    config: &IntruderConfig,
    shared: Arc<Mutex<SharedState>>,
    started: Instant,
) -> LoopParts {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
    // tokio panics on a zero-capacity channel.
    let (event_tx, event_rx) = mpsc::channel::<IntruderEvent>(config.event_channel_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(connection::run(
        transport,
        LoopContext {
            cmd_rx,
            event_tx,
            shared,
            shutdown_rx,
            connect_deadline: started + config.connect_timeout,
            request_timeout: config.request_timeout,
        },
    ));
    (cmd_tx, task, shutdown_tx, event_rx)
}

#[cfg(feature = "transport-websocket")]
async fn dial(config: &IntruderConfig) -> Result<crate::transports::WebSocketTransport> {
    let url = config.websocket_url()?;
    crate::transports::WebSocketTransport::connect_with_timeout(&url, config.connect_timeout).await
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::directory::{RoomDirectoryEntry, RoomList};
    use crate::session::SessionPhase;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replays scripted server frames and records what the client sends.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, IntruderError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, IntruderError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), IntruderError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, IntruderError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                // Script exhausted: stay open until shutdown.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), IntruderError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn connect_json(id: &str) -> Option<std::result::Result<String, IntruderError>> {
        Some(Ok(format!(
            r#"{{"type":"connect","data":{{"connectionId":"{id}"}}}}"#
        )))
    }

    /// Wait until the loop has written `n` messages to the transport.
    async fn wait_for_sent(sent: &StdMutex<Vec<String>>, n: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while sent.lock().unwrap().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("client did not send in time");
    }

    async fn connected_client() -> (
        IntruderClient,
        mpsc::Receiver<IntruderEvent>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let (transport, sent, _closed) = MockTransport::new(vec![connect_json("c1")]);
        let (client, mut events) = IntruderClient::start(transport, IntruderConfig::default());
        assert_eq!(
            events.recv().await.unwrap(),
            IntruderEvent::Connected {
                connection_id: Some("c1".into())
            }
        );
        (client, events, sent)
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn starts_connecting_and_rejects_intents() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) = IntruderClient::start(transport, IntruderConfig::default());

        assert_eq!(client.connection_state(), ConnectionState::Connecting);
        assert!(matches!(
            client.create_room("alice"),
            Err(IntruderError::NotConnected)
        ));
        assert_eq!(client.session().phase, SessionPhase::NoRoom);

        client.disconnect().await;
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_room_queues_wire_message() {
        let (mut client, _events, sent) = connected_client().await;
        assert_eq!(client.connection_id().as_deref(), Some("c1"));

        client.create_room("alice").unwrap();
        assert_eq!(client.session().phase, SessionPhase::Creating);

        wait_for_sent(&sent, 1).await;
        client.disconnect().await;
        let messages = sent.lock().unwrap();
        let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(
            first,
            ClientMessage::CreateRoom {
                display_name: "alice".into(),
                room_code: None,
            }
        );
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![connect_json("c1")]);
        let (mut client, mut events) = IntruderClient::start(transport, IntruderConfig::default());
        let _ = events.recv().await;

        client.disconnect().await;
        client.disconnect().await;

        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(matches!(
            events.recv().await,
            Some(IntruderEvent::Disconnected { .. })
        ));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn listed_room_join_checks_directory_first() {
        let (mut client, _events, sent) = connected_client().await;
        let directory = RoomList {
            rooms: vec![RoomDirectoryEntry {
                code: "AB12CD".into(),
                player_count: 1,
                players: BTreeMap::new(),
            }],
            total: 1,
        };

        let err = client
            .join_listed_room(&directory, "bob", "ZZ99ZZ")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(&ErrorCode::RoomNotFound));
        assert_eq!(client.session().phase, SessionPhase::NoRoom);

        client
            .join_listed_room(&directory, "bob", "ab12cd")
            .await
            .unwrap();
        assert_eq!(
            client.session().phase,
            SessionPhase::Joining {
                room_code: "AB12CD".into()
            }
        );

        wait_for_sent(&sent, 1).await;
        client.disconnect().await;
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn created_room_is_listed_is_false_outside_a_room() {
        let (mut client, _events, _sent) = connected_client().await;
        assert!(!client
            .created_room_is_listed(&RoomList::default())
            .await
            .unwrap());
        client.disconnect().await;
    }

    #[tokio::test]
    async fn debug_shows_connection_and_phase() {
        let (mut client, _events, _sent) = connected_client().await;
        let text = format!("{client:?}");
        assert!(text.contains("Connected"));
        assert!(text.contains("NoRoom"));
        client.disconnect().await;
    }
}
