//! Room session state machine.
//!
//! [`RoomSession`] is the local model of "my current room membership". It is
//! mutated only by local intents (through [`dispatch`](crate::dispatch)) and by
//! inbound server messages (through [`RoomSession::apply`]); everything else
//! reads a [`SessionSnapshot`].
//!
//! # State Diagram
//!
//! ```text
//!                 begin_create              room-created
//!            ┌──────────────────▶ Creating ─────────────────┐
//!            │                       │                      ▼
//!  ┌────────┐│                       │ error / timeout  ┌────────┐
//!  │ NoRoom │◀───────────────────────┴──────────────────│ InRoom │
//!  └────────┘│                       │  leave / disconnect└────────┘
//!            │                       │ error / timeout      ▲
//!            └──────────────────▶ Joining ──────────────────┘
//!                 begin_join                room-joined
//! ```
//!
//! Invariants: `is_host` implies `room_code.is_some()`, and the roster never
//! holds two players with the same id.

use std::collections::HashSet;
use std::fmt;

use crate::error::{IntruderError, Result};
use crate::protocol::{ConnectionId, Player, ServerError, ServerMessage};
use crate::room_code;

// ── Phase ───────────────────────────────────────────────────────────

/// Where the session is in the create/join lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not in a room and no request outstanding.
    #[default]
    NoRoom,
    /// `create-room` sent, waiting for `room-created`.
    Creating,
    /// `join-room` sent, waiting for `room-joined`.
    Joining { room_code: String },
    /// Membership confirmed by the server.
    InRoom,
}

impl SessionPhase {
    /// Short description used in [`IntruderError::InvalidState`].
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NoRoom => "not in a room",
            Self::Creating => "creating a room",
            Self::Joining { .. } => "joining a room",
            Self::InRoom => "in a room",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRoom => write!(f, "NoRoom"),
            Self::Creating => write!(f, "Creating"),
            Self::Joining { room_code } => write!(f, "Joining({room_code})"),
            Self::InRoom => write!(f, "InRoom"),
        }
    }
}

/// A create or join request that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    Create,
    Join { room_code: String },
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Read-only copy of the session, handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub room_code: Option<String>,
    pub is_host: bool,
    pub players: Vec<Player>,
    pub local_display_name: String,
    pub connection_id: Option<ConnectionId>,
}

impl SessionSnapshot {
    pub fn in_room(&self) -> bool {
        self.phase == SessionPhase::InRoom
    }

    /// The roster entry for this connection, if the server listed it.
    pub fn local_player(&self) -> Option<&Player> {
        let id = self.connection_id.as_deref()?;
        self.players.iter().find(|p| p.id == id)
    }
}

// ── Apply outcome ───────────────────────────────────────────────────

/// What [`RoomSession::apply`] did with a server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A pending create was confirmed.
    Created { room_code: String },
    /// A pending join was confirmed, or the roster was re-sent in full.
    Joined { room_code: String },
    PlayerJoined(Player),
    PlayerLeft(Player),
    /// The server named a host; `is_host` is this client's recomputed flag.
    HostChanged { host_id: ConnectionId, is_host: bool },
    /// The server reported an error. `aborted` is the request it cancelled.
    Failed {
        error: ServerError,
        aborted: Option<PendingRequest>,
    },
    /// The message does not apply to the current state and was discarded.
    Ignored { reason: &'static str },
}

// ── RoomSession ─────────────────────────────────────────────────────

/// The local session state machine.
#[derive(Debug, Clone, Default)]
pub struct RoomSession {
    phase: SessionPhase,
    room_code: Option<String>,
    is_host: bool,
    players: Vec<Player>,
    local_display_name: String,
    connection_id: Option<ConnectionId>,
    /// Whether the pending create/join has been written to the transport.
    request_sent: bool,
}

impl RoomSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn local_display_name(&self) -> &str {
        &self.local_display_name
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Returns `true` while a create or join awaits confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Creating | SessionPhase::Joining { .. }
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            room_code: self.room_code.clone(),
            is_host: self.is_host,
            players: self.players.clone(),
            local_display_name: self.local_display_name.clone(),
            connection_id: self.connection_id.clone(),
        }
    }

    // ── Local transitions ───────────────────────────────────────────

    /// Record the name this client presents on create/join.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.local_display_name = name.into();
    }

    /// Record the identifier the server assigned to this connection.
    pub fn set_connection_id(&mut self, connection_id: Option<ConnectionId>) {
        self.connection_id = connection_id;
    }

    /// `NoRoom → Creating`.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidState`] unless the session is in `NoRoom`.
    pub fn begin_create(&mut self, display_name: impl Into<String>) -> Result<()> {
        self.require_no_room("create a room")?;
        self.local_display_name = display_name.into();
        self.phase = SessionPhase::Creating;
        self.request_sent = false;
        tracing::debug!("session: creating room");
        Ok(())
    }

    /// `NoRoom → Joining`.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidState`] unless the session is in `NoRoom`.
    pub fn begin_join(
        &mut self,
        display_name: impl Into<String>,
        room_code: impl Into<String>,
    ) -> Result<()> {
        self.require_no_room("join a room")?;
        let room_code = room_code.into();
        self.local_display_name = display_name.into();
        tracing::debug!(room = %room_code, "session: joining room");
        self.phase = SessionPhase::Joining { room_code };
        self.request_sent = false;
        Ok(())
    }

    /// `InRoom → NoRoom`. Returns the code of the room that was left.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidState`] unless the session is in `InRoom`.
    pub fn leave(&mut self) -> Result<String> {
        if self.phase != SessionPhase::InRoom {
            return Err(self.invalid("leave the room"));
        }
        let room_code = self.room_code.take().unwrap_or_default();
        self.reset();
        tracing::debug!(room = %room_code, "session: left room");
        Ok(room_code)
    }

    /// Record that the pending create/join reached the transport. Only a sent
    /// request can be cancelled by a server `error`.
    pub fn mark_request_sent(&mut self) {
        if self.is_pending() {
            self.request_sent = true;
        }
    }

    /// Cancel an outstanding create/join, returning what was cancelled.
    pub fn abort_pending(&mut self) -> Option<PendingRequest> {
        let aborted = match &self.phase {
            SessionPhase::Creating => PendingRequest::Create,
            SessionPhase::Joining { room_code } => PendingRequest::Join {
                room_code: room_code.clone(),
            },
            SessionPhase::NoRoom | SessionPhase::InRoom => return None,
        };
        self.reset();
        tracing::debug!(?aborted, "session: pending request aborted");
        Some(aborted)
    }

    /// Back to `NoRoom`. The display name and connection id survive.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::NoRoom;
        self.room_code = None;
        self.is_host = false;
        self.players.clear();
        self.request_sent = false;
    }

    /// The connection is gone: reset and forget the connection id.
    pub fn connection_lost(&mut self) -> Option<PendingRequest> {
        let aborted = self.abort_pending();
        self.reset();
        self.connection_id = None;
        aborted
    }

    // ── Inbound messages ────────────────────────────────────────────

    /// Apply one server message.
    ///
    /// Connection lifecycle messages (`connect`, `connect-error`, `disconnect`)
    /// belong to the connection manager and are ignored here.
    pub fn apply(&mut self, msg: &ServerMessage) -> Applied {
        match msg {
            ServerMessage::RoomCreated { room_code, players } => {
                self.on_room_created(room_code, players)
            }
            ServerMessage::RoomJoined { room_code, players } => {
                self.on_room_joined(room_code, players)
            }
            ServerMessage::PlayerJoined {
                player,
                players,
                room_code,
            } => {
                if let Err(reason) = self.accepts_room_event(room_code.as_deref()) {
                    return ignored(reason);
                }
                match players {
                    Some(roster) => self.players = dedup_roster(roster),
                    None => self.upsert_player(player.clone()),
                }
                Applied::PlayerJoined(player.clone())
            }
            ServerMessage::PlayerLeft {
                player,
                players,
                room_code,
            } => {
                if let Err(reason) = self.accepts_room_event(room_code.as_deref()) {
                    return ignored(reason);
                }
                match players {
                    Some(roster) => self.players = dedup_roster(roster),
                    None => self.players.retain(|p| p.id != player.id),
                }
                Applied::PlayerLeft(player.clone())
            }
            ServerMessage::RoomHost { host_id, room_code } => {
                if let Err(reason) = self.accepts_room_event(room_code.as_deref()) {
                    return ignored(reason);
                }
                self.is_host = self.connection_id.as_deref() == Some(host_id.as_str());
                Applied::HostChanged {
                    host_id: host_id.clone(),
                    is_host: self.is_host,
                }
            }
            ServerMessage::Error(error) => {
                // An error that overtakes our queued request is not its answer.
                let aborted = if self.request_sent {
                    self.abort_pending()
                } else {
                    None
                };
                Applied::Failed {
                    error: error.clone(),
                    aborted,
                }
            }
            ServerMessage::Connect { .. }
            | ServerMessage::ConnectError { .. }
            | ServerMessage::Disconnect { .. } => ignored("connection lifecycle message"),
        }
    }

    fn on_room_created(&mut self, room_code: &str, players: &[Player]) -> Applied {
        match &self.phase {
            SessionPhase::Creating => {}
            SessionPhase::InRoom if self.is_current_room(room_code) => {
                return ignored("room already confirmed");
            }
            _ => return ignored("no create request pending"),
        }

        let roster = if players.is_empty() {
            self.seed_local_player()
        } else {
            dedup_roster(players)
        };
        self.enter_room(room_code, true, roster);
        Applied::Created {
            room_code: room_code.to_string(),
        }
    }

    fn on_room_joined(&mut self, room_code: &str, players: &[Player]) -> Applied {
        let as_host = match &self.phase {
            SessionPhase::Joining { room_code: requested } => {
                if !room_code::same_room(requested, room_code) {
                    tracing::warn!(
                        requested = %requested,
                        confirmed = %room_code,
                        "server confirmed a different room than requested"
                    );
                }
                false
            }
            // Some servers confirm a create with the joined roster.
            SessionPhase::Creating => true,
            SessionPhase::InRoom if self.is_current_room(room_code) => self.is_host,
            _ => return ignored("no join request pending"),
        };

        self.enter_room(room_code, as_host, dedup_roster(players));
        Applied::Joined {
            room_code: room_code.to_string(),
        }
    }

    fn enter_room(&mut self, room_code: &str, as_host: bool, roster: Vec<Player>) {
        self.phase = SessionPhase::InRoom;
        self.room_code = Some(room_code.to_string());
        self.is_host = as_host;
        self.players = roster;
        tracing::debug!(
            room = %room_code,
            host = as_host,
            players = self.players.len(),
            "session: in room"
        );
    }

    fn seed_local_player(&self) -> Vec<Player> {
        self.connection_id
            .as_ref()
            .map(|id| vec![Player::new(id.clone(), self.local_display_name.clone())])
            .unwrap_or_default()
    }

    fn upsert_player(&mut self, player: Player) {
        match self.players.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => existing.name = player.name,
            None => self.players.push(player),
        }
    }

    fn is_current_room(&self, room_code: &str) -> bool {
        self.room_code
            .as_deref()
            .is_some_and(|current| room_code::same_room(current, room_code))
    }

    /// Roster and host events apply only in `InRoom`, and only to the current room.
    fn accepts_room_event(&self, room_code: Option<&str>) -> std::result::Result<(), &'static str> {
        if self.phase != SessionPhase::InRoom {
            return Err("not in a room");
        }
        match room_code {
            Some(code) if !self.is_current_room(code) => Err("event for another room"),
            _ => Ok(()),
        }
    }

    fn require_no_room(&self, intent: &'static str) -> Result<()> {
        if self.phase == SessionPhase::NoRoom {
            Ok(())
        } else {
            Err(self.invalid(intent))
        }
    }

    fn invalid(&self, intent: &'static str) -> IntruderError {
        IntruderError::InvalidState {
            intent,
            phase: self.phase.describe(),
        }
    }
}

fn ignored(reason: &'static str) -> Applied {
    tracing::debug!(reason, "session: message ignored");
    Applied::Ignored { reason }
}

/// Keep the first entry for each player id, preserving order.
fn dedup_roster(players: &[Player]) -> Vec<Player> {
    let mut seen = HashSet::new();
    players
        .iter()
        .filter(|p| seen.insert(p.id.as_str()))
        .cloned()
        .collect()
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
    use crate::error_codes::ErrorCode;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn alice() -> Player {
        Player::new("1", "alice")
    }

    fn bob() -> Player {
        Player::new("2", "bob")
    }

    fn session_with_connection(id: &str) -> RoomSession {
        let mut session = RoomSession::new();
        session.set_connection_id(Some(id.to_string()));
        session
    }

    fn in_room(code: &str, players: Vec<Player>) -> RoomSession {
        let mut session = session_with_connection("2");
        session.begin_join("bob", code).unwrap();
        session.apply(&ServerMessage::RoomJoined {
            room_code: code.into(),
            players,
        });
        session
    }

    fn joined(player: Player) -> ServerMessage {
        ServerMessage::PlayerJoined {
            player,
            players: None,
            room_code: None,
        }
    }

    fn left(player: Player) -> ServerMessage {
        ServerMessage::PlayerLeft {
            player,
            players: None,
            room_code: None,
        }
    }

    #[test]
    fn create_then_room_created_makes_host() {
        let mut session = session_with_connection("1");
        session.begin_create("alice").unwrap();
        assert_eq!(session.phase(), &SessionPhase::Creating);

        let applied = session.apply(&ServerMessage::RoomCreated {
            room_code: "AB12CD".into(),
            players: vec![],
        });

        assert_eq!(
            applied,
            Applied::Created {
                room_code: "AB12CD".into()
            }
        );
        assert_eq!(
            session.snapshot(),
            SessionSnapshot {
                phase: SessionPhase::InRoom,
                room_code: Some("AB12CD".into()),
                is_host: true,
                players: vec![alice()],
                local_display_name: "alice".into(),
                connection_id: Some("1".into()),
            }
        );
    }

    #[test]
    fn room_created_without_connection_id_leaves_roster_empty() {
        let mut session = RoomSession::new();
        session.begin_create("alice").unwrap();
        session.apply(&ServerMessage::RoomCreated {
            room_code: "ZZ99ZZ".into(),
            players: vec![],
        });
        assert!(session.is_host());
        assert!(session.players().is_empty());
    }

    #[test]
    fn join_then_room_joined_uses_server_roster_exactly() {
        let session = in_room("AB12CD", vec![alice(), bob()]);
        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::InRoom);
        assert_eq!(snap.room_code.as_deref(), Some("AB12CD"));
        assert!(!snap.is_host);
        assert_eq!(snap.players, vec![alice(), bob()]);
        assert_eq!(snap.local_player(), Some(&bob()));
    }

    #[test]
    fn room_joined_roster_is_deduplicated() {
        let session = in_room("AB12CD", vec![alice(), bob(), Player::new("1", "alice again")]);
        assert_eq!(session.players(), &[alice(), bob()]);
    }

    #[test]
    fn player_left_with_roster_replaces_it() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        let applied = session.apply(&ServerMessage::PlayerLeft {
            player: bob(),
            players: Some(vec![alice()]),
            room_code: None,
        });
        assert_eq!(applied, Applied::PlayerLeft(bob()));
        assert_eq!(session.players(), &[alice()]);
    }

    #[test]
    fn incremental_join_updates_existing_entry_instead_of_duplicating() {
        let mut session = in_room("AB12CD", vec![alice()]);
        session.apply(&joined(Player::new("1", "alice2")));
        assert_eq!(session.players(), &[Player::new("1", "alice2")]);
    }

    #[test]
    fn roster_events_outside_a_room_are_ignored() {
        let mut session = session_with_connection("1");
        let applied = session.apply(&joined(bob()));
        assert_eq!(
            applied,
            Applied::Ignored {
                reason: "not in a room"
            }
        );
        assert!(session.players().is_empty());
    }

    #[test]
    fn events_for_another_room_are_stale() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        let applied = session.apply(&ServerMessage::PlayerLeft {
            player: alice(),
            players: Some(vec![]),
            room_code: Some("OLD123".into()),
        });
        assert!(matches!(applied, Applied::Ignored { .. }));
        assert_eq!(session.players().len(), 2);
    }

    #[test]
    fn room_code_comparison_ignores_case() {
        let mut session = in_room("AB12CD", vec![alice()]);
        let applied = session.apply(&ServerMessage::PlayerJoined {
            player: bob(),
            players: None,
            room_code: Some("ab12cd".into()),
        });
        assert_eq!(applied, Applied::PlayerJoined(bob()));
    }

    #[test]
    fn host_is_decided_by_connection_id_not_name() {
        // Two players share the display name "bob"; only the id decides.
        let mut session = in_room("AB12CD", vec![Player::new("9", "bob"), bob()]);
        let applied = session.apply(&ServerMessage::RoomHost {
            host_id: "9".into(),
            room_code: None,
        });
        assert_eq!(
            applied,
            Applied::HostChanged {
                host_id: "9".into(),
                is_host: false
            }
        );
        assert!(!session.is_host());

        session.apply(&ServerMessage::RoomHost {
            host_id: "2".into(),
            room_code: None,
        });
        assert!(session.is_host());
    }

    #[test]
    fn host_event_outside_room_keeps_invariant() {
        let mut session = session_with_connection("1");
        session.apply(&ServerMessage::RoomHost {
            host_id: "1".into(),
            room_code: None,
        });
        assert!(!session.is_host());
        assert!(session.room_code().is_none());
    }

    #[test]
    fn leave_resets_to_no_room() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        assert_eq!(session.leave().unwrap(), "AB12CD");
        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::NoRoom);
        assert!(snap.room_code.is_none());
        assert!(snap.players.is_empty());
        assert!(!snap.is_host);
        assert_eq!(snap.local_display_name, "bob");
    }

    #[test]
    fn late_events_after_leave_are_discarded() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        session.leave().unwrap();
        assert!(matches!(
            session.apply(&joined(Player::new("3", "carol"))),
            Applied::Ignored { .. }
        ));
        assert!(matches!(
            session.apply(&ServerMessage::RoomJoined {
                room_code: "AB12CD".into(),
                players: vec![alice()],
            }),
            Applied::Ignored { .. }
        ));
        assert!(session.players().is_empty());
    }

    #[test]
    fn invalid_transitions_are_rejected_without_mutation() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        let before = session.snapshot();

        let err = session.begin_create("bob").unwrap_err();
        assert!(matches!(
            err,
            IntruderError::InvalidState {
                phase: "in a room",
                ..
            }
        ));
        assert!(session.begin_join("bob", "XY").is_err());
        assert_eq!(session.snapshot(), before);

        let mut idle = RoomSession::new();
        assert!(matches!(
            idle.leave(),
            Err(IntruderError::InvalidState {
                phase: "not in a room",
                ..
            })
        ));
    }

    #[test]
    fn error_during_join_returns_to_no_room() {
        let mut session = session_with_connection("2");
        session.begin_join("bob", "AB12CD").unwrap();
        session.mark_request_sent();
        let applied = session.apply(&ServerMessage::Error(ServerError {
            message: "Room is full".into(),
            error_code: Some(ErrorCode::RoomFull),
        }));
        assert_eq!(
            applied,
            Applied::Failed {
                error: ServerError {
                    message: "Room is full".into(),
                    error_code: Some(ErrorCode::RoomFull),
                },
                aborted: Some(PendingRequest::Join {
                    room_code: "AB12CD".into()
                }),
            }
        );
        assert_eq!(session.phase(), &SessionPhase::NoRoom);
    }

    #[test]
    fn error_before_request_is_sent_keeps_it_pending() {
        let mut session = session_with_connection("1");
        session.begin_create("alice").unwrap();
        let applied = session.apply(&ServerMessage::Error(ServerError {
            message: "slow down".into(),
            error_code: None,
        }));
        assert!(matches!(applied, Applied::Failed { aborted: None, .. }));
        assert_eq!(session.phase(), &SessionPhase::Creating);

        // The confirmation for the request still lands.
        session.mark_request_sent();
        let applied = session.apply(&ServerMessage::RoomCreated {
            room_code: "AB12CD".into(),
            players: vec![],
        });
        assert_eq!(
            applied,
            Applied::Created {
                room_code: "AB12CD".into()
            }
        );
        assert!(session.is_host());
    }

    #[test]
    fn sent_flag_does_not_outlive_the_request() {
        let mut session = session_with_connection("1");
        session.mark_request_sent();
        session.begin_create("alice").unwrap();
        let applied = session.apply(&ServerMessage::Error(ServerError {
            message: "bad".into(),
            error_code: None,
        }));
        assert!(matches!(applied, Applied::Failed { aborted: None, .. }));
        assert_eq!(session.phase(), &SessionPhase::Creating);
    }

    #[test]
    fn error_while_in_room_keeps_membership() {
        let mut session = in_room("AB12CD", vec![alice(), bob()]);
        let applied = session.apply(&ServerMessage::Error(ServerError {
            message: "slow down".into(),
            error_code: None,
        }));
        assert!(matches!(applied, Applied::Failed { aborted: None, .. }));
        assert!(session.snapshot().in_room());
    }

    #[test]
    fn room_joined_while_creating_confirms_as_host() {
        let mut session = session_with_connection("1");
        session.begin_create("alice").unwrap();
        session.apply(&ServerMessage::RoomJoined {
            room_code: "AB12CD".into(),
            players: vec![alice()],
        });
        assert!(session.is_host());
        assert_eq!(session.players(), &[alice()]);
    }

    #[test]
    fn connection_lost_aborts_pending_and_forgets_identity() {
        let mut session = session_with_connection("1");
        session.begin_create("alice").unwrap();
        assert_eq!(session.connection_lost(), Some(PendingRequest::Create));
        assert_eq!(session.phase(), &SessionPhase::NoRoom);
        assert!(session.connection_id().is_none());
    }

    #[test]
    fn roster_size_tracks_joins_minus_leaves() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut session = in_room("AB12CD", vec![]);
        let mut expected: Vec<String> = Vec::new();
        let mut next_id = 0u32;

        for _ in 0..500 {
            if expected.is_empty() || rng.gen_bool(0.6) {
                next_id += 1;
                let id = next_id.to_string();
                session.apply(&joined(Player::new(id.clone(), "p")));
                expected.push(id);
            } else {
                let idx = rng.gen_range(0..expected.len());
                let id = expected.remove(idx);
                session.apply(&left(Player::new(id, "p")));
            }

            let ids: HashSet<&str> = session.players().iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids.len(), session.players().len(), "duplicate ids in roster");
            assert_eq!(session.players().len(), expected.len());
        }
    }
}
