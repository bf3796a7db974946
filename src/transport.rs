//! Transport abstraction for the Image Intruder room protocol.
//!
//! The [`Transport`] trait is a bidirectional text message channel between the
//! client and the room server. Each message is one JSON document, so every
//! implementation handles framing internally (WebSocket frames, length-prefixed
//! TCP, an in-memory channel in tests).
//!
//! # Connection Setup
//!
//! Dialing is NOT part of this trait. Construct a connected transport
//! externally (or use `IntruderClient::connect`, which dials a
//! `WebSocketTransport`), then hand it to `IntruderClient::start`. The server
//! still has to complete the `connect` handshake before the client is
//! `Connected`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use image_intruder_client::error::IntruderError;
//! use image_intruder_client::transport::Transport;
//! use tokio::sync::mpsc;
//!
//! struct ChannelTransport {
//!     outgoing: mpsc::UnboundedSender<String>,
//!     incoming: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, message: String) -> Result<(), IntruderError> {
//!         self.outgoing
//!             .send(message)
//!             .map_err(|e| IntruderError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, IntruderError>> {
//!         self.incoming.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), IntruderError> {
//!         self.incoming.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::IntruderError;

/// A bidirectional text message transport for the Image Intruder protocol.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message
/// and each call to [`recv`](Transport::recv) returns one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the transport loop
/// polls it inside `tokio::select!` next to timers and the command channel.
/// Channel-based implementations are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`IntruderError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), IntruderError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, IntruderError>>;

    /// Close the transport connection gracefully.
    ///
    /// Implementations should release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), IntruderError>;
}
