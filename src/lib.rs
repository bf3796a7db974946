//! # Image Intruder Client
//!
//! Client-side room session and presence for the Image Intruder party game.
//!
//! The crate keeps a local model of "which room am I in, who else is there,
//! am I the host" in sync with a room server over JSON text messages, and
//! reports every change as a typed [`IntruderEvent`].
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any backend
//! - **WebSocket built-in**: default `transport-websocket` feature provides `WebSocketTransport`
//! - **Room directory**: default `directory-http` feature queries `GET /rooms`
//! - **Strict state machine**: invalid intents fail locally and never reach the wire
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use image_intruder_client::{IntruderClient, IntruderConfig, IntruderEvent};
//!
//! let (client, mut events) = IntruderClient::connect(IntruderConfig::from_env()).await?;
//! while let Some(event) = events.recv().await {
//!     if let IntruderEvent::Connected { .. } = event {
//!         client.join_room("bob", "ab12cd")?;
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod protocol;
pub mod room_code;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::IntruderClient;
pub use config::{Environment, IntruderConfig};
pub use connection::ConnectionState;
pub use directory::{RoomDirectory, RoomDirectoryEntry, RoomList};
pub use dispatch::Intent;
pub use error::{IntruderError, Result};
pub use error_codes::ErrorCode;
pub use event::IntruderEvent;
pub use protocol::{ClientMessage, Player, ServerMessage};
pub use session::{PendingRequest, SessionPhase, SessionSnapshot};
pub use transport::Transport;

#[cfg(feature = "directory-http")]
pub use directory::HttpRoomDirectory;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
