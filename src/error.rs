//! Error types for the Image Intruder client.

use thiserror::Error;

use crate::error_codes::ErrorCode;

/// Errors that can occur when using the Image Intruder client.
#[derive(Debug, Error)]
pub enum IntruderError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// The server refused the connection or the handshake never completed.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An intent was issued while the connection is not in the `Connected` state.
    #[error("not connected to server")]
    NotConnected,

    /// An intent was issued in a session phase that forbids it.
    #[error("cannot {intent} while {phase}")]
    InvalidState {
        /// The rejected intent (e.g. `"create a room"`).
        intent: &'static str,
        /// The session phase the client was in.
        phase: &'static str,
    },

    /// An intent carried unusable input (blank display name or room code).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The server (or the room directory) reported a protocol-level error.
    #[error("server error: {message}")]
    Protocol {
        /// Human-readable error message.
        message: String,
        /// Structured error code, if one was provided.
        error_code: Option<ErrorCode>,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The configured server URL could not be used.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// The room directory query failed.
    #[error("room directory error: {0}")]
    Directory(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntruderError {
    /// Returns `true` for errors detected locally, before anything reached the server.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::InvalidState { .. } | Self::InvalidInput(_)
        )
    }

    /// Returns `true` for errors raised by the underlying connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportSend(_)
                | Self::TransportReceive(_)
                | Self::TransportClosed
                | Self::ConnectFailed(_)
                | Self::Timeout
                | Self::Io(_)
        )
    }

    /// Structured error code, for protocol errors that carry one.
    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Protocol { error_code, .. } => error_code.as_ref(),
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for Image Intruder client operations.
pub type Result<T> = std::result::Result<T, IntruderError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_intent_and_phase() {
        let err = IntruderError::InvalidState {
            intent: "create a room",
            phase: "in a room",
        };
        assert_eq!(err.to_string(), "cannot create a room while in a room");
        assert!(err.is_local());
        assert!(!err.is_transport());
    }

    #[test]
    fn classification() {
        assert!(IntruderError::NotConnected.is_local());
        assert!(IntruderError::TransportClosed.is_transport());
        assert!(IntruderError::ConnectFailed("refused".into()).is_transport());

        let protocol = IntruderError::Protocol {
            message: "room is full".into(),
            error_code: Some(ErrorCode::RoomFull),
        };
        assert!(!protocol.is_local());
        assert!(!protocol.is_transport());
        assert_eq!(protocol.error_code(), Some(&ErrorCode::RoomFull));
    }
}
