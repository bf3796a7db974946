//! Wire protocol types for the Image Intruder room server.
//!
//! Every message is one JSON text frame of the form
//! `{"type": "<event-name>", "data": { ... }}`. Event names are kebab-case and
//! payload fields are camelCase, matching the server's event set:
//!
//! | Direction | Events |
//! |-----------|--------|
//! | client → server | `create-room`, `join-room`, `leave-room` |
//! | server → client | `connect`, `connect-error`, `disconnect`, `room-created`, `room-joined`, `player-joined`, `player-left`, `room-host`, `error` |

use serde::{Deserialize, Serialize};

use crate::error_codes::ErrorCode;

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned identifier of one client connection.
pub type ConnectionId = String;

/// Server-assigned identifier of a player, unique within a room.
pub type PlayerId = String;

// ── Structs ─────────────────────────────────────────────────────────

/// A player in a room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name. Not required to be unique within a room.
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Payload of the server `error` event.
///
/// The server sends either a structured object (`{"message": ..., "type": ...}`)
/// or a bare message string; both decode into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ServerErrorRepr")]
pub struct ServerError {
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ServerErrorRepr {
    Bare(String),
    Detailed {
        message: String,
        #[serde(default, rename = "type")]
        error_code: Option<ErrorCode>,
    },
}

impl From<ServerErrorRepr> for ServerError {
    fn from(repr: ServerErrorRepr) -> Self {
        match repr {
            ServerErrorRepr::Bare(message) => Self {
                message,
                error_code: None,
            },
            ServerErrorRepr::Detailed {
                message,
                error_code,
            } => Self {
                message,
                error_code,
            },
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Create a new room and become its host.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        display_name: String,
        /// Client-proposed room code. The server may assign its own.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    /// Join an existing room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        display_name: String,
        room_code: String,
    },
    /// Leave the current room. No acknowledgment is expected.
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_code: String },
}

/// Message types sent from server to client.
///
/// The lifecycle events (`connect`, `connect-error`, `disconnect`) may arrive
/// as bare frames without a `data` member; every payload field is optional
/// for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Handshake completed; carries this client's connection identifier when
    /// the server assigns one.
    #[serde(rename_all = "camelCase")]
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<ConnectionId>,
    },
    /// The server refused the connection.
    ConnectError {
        #[serde(default)]
        message: String,
    },
    /// The server is closing the connection.
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A `create-room` request succeeded.
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: String,
        /// Initial roster, when the server sends one.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        players: Vec<Player>,
    },
    /// A `join-room` request succeeded; carries the full roster.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: String,
        players: Vec<Player>,
    },
    /// Another player joined the room.
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player: Player,
        /// Full roster after the join, when re-sent by the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        players: Option<Vec<Player>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    /// A player left the room.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player: Player,
        /// Full roster after the leave, when re-sent by the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        players: Option<Vec<Player>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    /// The server designated a host for the room.
    #[serde(rename_all = "camelCase")]
    RoomHost {
        host_id: ConnectionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    /// A request failed or the server reported a problem.
    Error(ServerError),
}

/// Tag and raw payload of an inbound frame, before variant dispatch.
#[derive(Deserialize)]
struct ServerFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

const LIFECYCLE_EVENTS: [&str; 3] = ["connect", "connect-error", "disconnect"];

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ServerFrame { kind, mut data } = ServerFrame::deserialize(deserializer)?;
        if data.is_null() && LIFECYCLE_EVENTS.contains(&kind.as_str()) {
            data = serde_json::Value::Object(serde_json::Map::new());
        }
        let frame = serde_json::json!({ "type": kind, "data": data });
        ServerMessage::deserialize(frame).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ServerMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ServerMessage::serialize(self, serializer)
    }
}

impl ServerMessage {
    /// The wire name of this message, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::ConnectError { .. } => "connect-error",
            Self::Disconnect { .. } => "disconnect",
            Self::RoomCreated { .. } => "room-created",
            Self::RoomJoined { .. } => "room-joined",
            Self::PlayerJoined { .. } => "player-joined",
            Self::PlayerLeft { .. } => "player-left",
            Self::RoomHost { .. } => "room-host",
            Self::Error(_) => "error",
        }
    }
}

impl ClientMessage {
    /// The wire name of this message, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom { .. } => "leave-room",
        }
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
    use serde_json::json;

    #[test]
    fn create_room_omits_absent_room_code() {
        let msg = ClientMessage::CreateRoom {
            display_name: "alice".into(),
            room_code: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "create-room", "data": {"displayName": "alice"}})
        );
    }

    #[test]
    fn error_accepts_bare_string_payload() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"error","data":"Room is full"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error(ServerError {
                message: "Room is full".into(),
                error_code: None,
            })
        );
    }

    #[test]
    fn error_type_field_maps_to_error_code() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"error","data":{"message":"nope","type":"room-not-found"}}"#,
        )
        .unwrap();
        let ServerMessage::Error(err) = msg else {
            panic!("expected error");
        };
        assert_eq!(err.error_code, Some(ErrorCode::RoomNotFound));
    }

    #[test]
    fn lifecycle_events_decode_without_payload() {
        let bare = |kind: &str| -> ServerMessage {
            serde_json::from_value(json!({ "type": kind })).unwrap()
        };
        assert_eq!(bare("connect"), ServerMessage::Connect { connection_id: None });
        assert_eq!(
            bare("connect-error"),
            ServerMessage::ConnectError {
                message: String::new()
            }
        );
        assert_eq!(bare("disconnect"), ServerMessage::Disconnect { reason: None });

        let null_data: ServerMessage =
            serde_json::from_str(r#"{"type":"disconnect","data":null}"#).unwrap();
        assert_eq!(null_data, ServerMessage::Disconnect { reason: None });
    }

    #[test]
    fn room_events_still_require_payload() {
        assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"room-joined"}"#).is_err());
        assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"room-host"}"#).is_err());
        assert!(serde_json::from_str::<ServerMessage>(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn event_names_match_wire_tags() {
        let msg = ServerMessage::RoomHost {
            host_id: "c1".into(),
            room_code: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], msg.event_name());
    }
}
