//! Events emitted to the UI layer.
//!
//! The transport loop turns every state change into one [`IntruderEvent`] on
//! the channel returned by [`IntruderClient::start`](crate::IntruderClient::start).
//! Roster-carrying events hold the roster *after* the change, so a consumer can
//! re-render from the event alone.

use crate::error_codes::ErrorCode;
use crate::protocol::{ConnectionId, Player};
use crate::session::{Applied, PendingRequest, RoomSession};

/// Something the UI should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntruderEvent {
    /// The server completed the handshake. Intents are accepted from now on.
    /// `connection_id` is absent when the server sent a bare `connect`.
    Connected { connection_id: Option<ConnectionId> },
    /// The connection never reached `Connected` (refused, closed early, or the
    /// connect timeout elapsed). Always the last event of its connection.
    ConnectFailed { reason: String },
    /// An established connection ended. Always the last event of its connection.
    Disconnected { reason: Option<String> },
    /// This client created a room and is its host.
    RoomCreated {
        room_code: String,
        players: Vec<Player>,
    },
    /// This client is in a room with the given roster.
    RoomJoined {
        room_code: String,
        players: Vec<Player>,
        is_host: bool,
    },
    PlayerJoined { player: Player, players: Vec<Player> },
    PlayerLeft { player: Player, players: Vec<Player> },
    /// The server designated `host_id` as host.
    HostChanged {
        host_id: ConnectionId,
        is_host: bool,
    },
    /// The server reported an error. `aborted` is the create/join it cancelled.
    Error {
        message: String,
        error_code: Option<ErrorCode>,
        aborted: Option<PendingRequest>,
    },
    /// A create/join got no reply within the request timeout and was abandoned.
    RequestTimedOut { request: PendingRequest },
}

impl IntruderEvent {
    /// Build the event for a session change. Ignored messages produce nothing.
    pub(crate) fn from_applied(applied: Applied, session: &RoomSession) -> Option<Self> {
        let roster = || session.players().to_vec();
        let event = match applied {
            Applied::Created { room_code } => Self::RoomCreated {
                room_code,
                players: roster(),
            },
            Applied::Joined { room_code } => Self::RoomJoined {
                room_code,
                players: roster(),
                is_host: session.is_host(),
            },
            Applied::PlayerJoined(player) => Self::PlayerJoined {
                player,
                players: roster(),
            },
            Applied::PlayerLeft(player) => Self::PlayerLeft {
                player,
                players: roster(),
            },
            Applied::HostChanged { host_id, is_host } => Self::HostChanged { host_id, is_host },
            Applied::Failed { error, aborted } => Self::Error {
                message: error.message,
                error_code: error.error_code,
                aborted,
            },
            Applied::Ignored { .. } => return None,
        };
        Some(event)
    }

    /// Returns `true` for the final event of a connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::Disconnected { .. })
    }
}
