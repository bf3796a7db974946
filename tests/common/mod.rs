#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Image Intruder client integration tests.
//!
//! Provides a channel-driven [`MockTransport`] whose other end, a
//! [`MockServer`], lets a test push server frames at any point and inspect
//! what the client sent. Also has helpers for common server message JSON.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image_intruder_client::error_codes::ErrorCode;
use image_intruder_client::protocol::{ServerError, ServerMessage};
use image_intruder_client::{
    ClientMessage, IntruderClient, IntruderConfig, IntruderError, IntruderEvent, Player, Transport,
};
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

enum Frame {
    Text(String),
    Error(IntruderError),
    Close,
}

/// Client side of the mock connection.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
}

/// Test side of the mock connection.
pub struct MockServer {
    push: mpsc::UnboundedSender<Frame>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
}

/// Create a connected transport/server pair.
pub fn mock_pair() -> (MockTransport, MockServer) {
    let (push, incoming) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let fail_sends = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        incoming,
        sent: sent_tx,
        closed: Arc::clone(&closed),
        fail_sends: Arc::clone(&fail_sends),
    };
    let server = MockServer {
        push,
        sent: sent_rx,
        closed,
        fail_sends,
    };
    (transport, server)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), IntruderError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(IntruderError::TransportSend("mock send failure".into()));
        }
        let _ = self.sent.send(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, IntruderError>> {
        match self.incoming.recv().await {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Error(e)) => Some(Err(e)),
            Some(Frame::Close) => None,
            // Server handle dropped: stay open until the client shuts down.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), IntruderError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl MockServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, json: impl Into<String>) {
        let _ = self.push.send(Frame::Text(json.into()));
    }

    /// Make the next `recv` fail with a transport error.
    pub fn fail(&self, message: &str) {
        let _ = self
            .push
            .send(Frame::Error(IntruderError::TransportReceive(message.into())));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.push.send(Frame::Close);
    }

    /// Make every following client send fail.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Wait for the next message the client sent.
    pub async fn next_sent(&mut self) -> ClientMessage {
        let raw = tokio::time::timeout(Duration::from_secs(1), self.sent.recv())
            .await
            .expect("client did not send a message within 1s")
            .expect("transport dropped");
        serde_json::from_str(&raw).expect("client sent invalid JSON")
    }

    /// Everything the client has sent so far, without waiting.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(raw) = self.sent.try_recv() {
            out.push(serde_json::from_str(&raw).expect("client sent invalid JSON"));
        }
        out
    }
}

// ── Client helpers ──────────────────────────────────────────────────

/// Start a client over a mock transport with the default config.
pub fn start_client() -> (IntruderClient, mpsc::Receiver<IntruderEvent>, MockServer) {
    start_client_with(IntruderConfig::default())
}

pub fn start_client_with(
    config: IntruderConfig,
) -> (IntruderClient, mpsc::Receiver<IntruderEvent>, MockServer) {
    let (transport, server) = mock_pair();
    let (client, events) = IntruderClient::start(transport, config);
    (client, events, server)
}

/// Start a client and complete the handshake as `connection_id`.
pub async fn connected_client(
    connection_id: &str,
) -> (IntruderClient, mpsc::Receiver<IntruderEvent>, MockServer) {
    let (client, mut events, server) = start_client();
    server.push(connect_json(connection_id));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Connected {
            connection_id: Some(connection_id.into())
        }
    );
    (client, events, server)
}

/// Wait for the next event, failing the test after 1s.
pub async fn next_event(events: &mut mpsc::Receiver<IntruderEvent>) -> IntruderEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no event within 1s")
        .expect("event channel closed")
}

// ── JSON helper functions ───────────────────────────────────────────

fn to_json(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).expect("server message serialization")
}

pub fn connect_json(connection_id: &str) -> String {
    to_json(&ServerMessage::Connect {
        connection_id: Some(connection_id.into()),
    })
}

pub fn connect_error_json(message: &str) -> String {
    to_json(&ServerMessage::ConnectError {
        message: message.into(),
    })
}

pub fn disconnect_json(reason: Option<&str>) -> String {
    to_json(&ServerMessage::Disconnect {
        reason: reason.map(str::to_string),
    })
}

pub fn room_created_json(room_code: &str, players: &[Player]) -> String {
    to_json(&ServerMessage::RoomCreated {
        room_code: room_code.into(),
        players: players.to_vec(),
    })
}

pub fn room_joined_json(room_code: &str, players: &[Player]) -> String {
    to_json(&ServerMessage::RoomJoined {
        room_code: room_code.into(),
        players: players.to_vec(),
    })
}

pub fn player_joined_json(player: &Player) -> String {
    to_json(&ServerMessage::PlayerJoined {
        player: player.clone(),
        players: None,
        room_code: None,
    })
}

/// `player-left` tagged with a room code, optionally carrying the new roster.
pub fn player_left_json(player: &Player, room_code: Option<&str>, roster: Option<&[Player]>) -> String {
    to_json(&ServerMessage::PlayerLeft {
        player: player.clone(),
        players: roster.map(<[Player]>::to_vec),
        room_code: room_code.map(str::to_string),
    })
}

pub fn room_host_json(host_id: &str) -> String {
    to_json(&ServerMessage::RoomHost {
        host_id: host_id.into(),
        room_code: None,
    })
}

pub fn error_json(message: &str, error_code: Option<ErrorCode>) -> String {
    to_json(&ServerMessage::Error(ServerError {
        message: message.into(),
        error_code,
    }))
}

pub fn alice() -> Player {
    Player::new("c1", "alice")
}

pub fn bob() -> Player {
    Player::new("c2", "bob")
}

pub fn carol() -> Player {
    Player::new("c3", "carol")
}
