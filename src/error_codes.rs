//! Error codes carried by the server's `error` event.
//!
//! The server sends these as kebab-case strings in the optional `type` field
//! of an `error` payload (e.g. `"room-not-found"`). Codes this client does not
//! know decode as [`ErrorCode::Unknown`] instead of failing the whole message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes returned by the Image Intruder room server.
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    // Room errors
    RoomNotFound,
    RoomFull,
    AlreadyInRoom,
    InvalidRoomCode,

    // Player errors
    NameTaken,

    /// Any code not listed above.
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RoomNotFound => {
                "The requested room could not be found. It may have been closed or the code is incorrect."
            }
            Self::RoomFull => {
                "The room has reached its maximum player capacity. Try joining a different room."
            }
            Self::AlreadyInRoom => {
                "You are already in a room. Leave the current room before joining another."
            }
            Self::InvalidRoomCode => "The room code is invalid or malformed.",
            Self::NameTaken => {
                "Another player in this room already uses that name. Pick a different name."
            }
            Self::Unknown => "The server reported an unrecognized error.",
        }
    }

    /// Returns `true` if this error means the room cannot be entered as requested.
    pub fn rejects_join(&self) -> bool {
        matches!(
            self,
            Self::RoomNotFound | Self::RoomFull | Self::NameTaken | Self::InvalidRoomCode
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
