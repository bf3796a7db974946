//! Intent dispatch.
//!
//! Every user action goes through [`dispatch`], which checks it against the
//! current connection and session state, applies the local transition, and
//! returns the message to put on the wire. A rejected intent leaves the state
//! untouched and sends nothing.
//!
//! Checks run in a fixed order: connection first, then input, then session
//! phase. A create while disconnected is therefore `NotConnected` even if the
//! name is blank.

use crate::connection::SharedState;
use crate::error::{IntruderError, Result};
use crate::protocol::ClientMessage;
use crate::room_code;

/// A user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a room. `room_code` proposes a code; the server may pick another.
    CreateRoom {
        display_name: String,
        room_code: Option<String>,
    },
    JoinRoom {
        display_name: String,
        room_code: String,
    },
    LeaveRoom,
    /// Change the name used for the next create/join. Purely local.
    SetDisplayName(String),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create room",
            Self::JoinRoom { .. } => "join room",
            Self::LeaveRoom => "leave room",
            Self::SetDisplayName(_) => "set display name",
        }
    }
}

/// Validate `intent`, apply its local transition and return the message to send.
///
/// `Ok(None)` means the intent was handled locally.
///
/// # Errors
///
/// - [`IntruderError::NotConnected`] unless the connection is `Connected`.
/// - [`IntruderError::InvalidInput`] for a blank display name or room code.
/// - [`IntruderError::InvalidState`] when the session phase forbids the intent.
pub(crate) fn dispatch(state: &mut SharedState, intent: Intent) -> Result<Option<ClientMessage>> {
    if let Intent::SetDisplayName(name) = intent {
        let name = display_name(&name)?;
        state.session.set_display_name(name);
        return Ok(None);
    }

    if !state.connection.is_connected() {
        tracing::debug!(intent = intent.name(), state = %state.connection, "intent rejected");
        return Err(IntruderError::NotConnected);
    }

    let msg = match intent {
        Intent::CreateRoom {
            display_name: name,
            room_code: proposed,
        } => {
            let name = display_name(&name)?;
            let proposed = proposed.as_deref().and_then(room_code::normalize);
            state.session.begin_create(name.clone())?;
            ClientMessage::CreateRoom {
                display_name: name,
                room_code: proposed,
            }
        }
        Intent::JoinRoom {
            display_name: name,
            room_code: code,
        } => {
            let name = display_name(&name)?;
            let code = room_code::normalize(&code)
                .ok_or_else(|| IntruderError::InvalidInput("room code must not be blank".into()))?;
            state.session.begin_join(name.clone(), code.clone())?;
            ClientMessage::JoinRoom {
                display_name: name,
                room_code: code,
            }
        }
        Intent::LeaveRoom => ClientMessage::LeaveRoom {
            room_code: state.session.leave()?,
        },
        Intent::SetDisplayName(_) => return Ok(None),
    };

    tracing::debug!(event = msg.event_name(), "intent accepted");
    Ok(Some(msg))
}

fn display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IntruderError::InvalidInput(
            "display name must not be blank".into(),
        ));
    }
    Ok(name.to_string())
}
