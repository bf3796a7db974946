//! Integration-style client tests for the Image Intruder client.
//!
//! Uses the channel-driven `MockTransport` from `tests/common` to play the
//! server's side of a connection and verify that `IntruderClient` handles the
//! handshake, room lifecycle, presence updates, and connection loss correctly.

mod common;

use std::time::Duration;

use image_intruder_client::{
    ClientMessage, ConnectionState, ErrorCode, IntruderClient, IntruderConfig, IntruderError,
    IntruderEvent, PendingRequest, Player, SessionPhase,
};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use common::{
    alice, bob, carol, connect_error_json, connect_json, connected_client, disconnect_json,
    error_json, mock_pair, next_event, player_joined_json, player_left_json, room_created_json,
    room_host_json, room_joined_json, start_client, start_client_with,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

/// Connect as `bob` (`c2`) and join `AB12CD` with alice and bob in the room.
async fn bob_in_room() -> (
    IntruderClient,
    tokio::sync::mpsc::Receiver<IntruderEvent>,
    common::MockServer,
) {
    let (client, mut events, mut server) = connected_client("c2").await;
    client.join_room("bob", "AB12CD").unwrap();
    assert!(matches!(server.next_sent().await, ClientMessage::JoinRoom { .. }));

    server.push(room_joined_json("AB12CD", &[alice(), bob()]));
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::RoomJoined { .. }
    ));
    (client, events, server)
}

/// Push a server error and assert it is the next event. Used to prove that
/// the frames pushed before it produced no event.
async fn assert_nothing_before_marker(
    events: &mut tokio::sync::mpsc::Receiver<IntruderEvent>,
    server: &common::MockServer,
) {
    server.push(error_json("marker", None));
    let event = next_event(events).await;
    assert!(
        matches!(event, IntruderEvent::Error { ref message, .. } if message == "marker"),
        "expected only the marker error, got {event:?}"
    );
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn handshake_moves_to_connected() {
    let (mut client, mut events, server) = start_client();
    assert_eq!(client.connection_state(), ConnectionState::Connecting);

    server.push(connect_json("c1"));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Connected {
            connection_id: Some("c1".into())
        }
    );
    assert!(client.is_connected());
    assert_eq!(client.connection_id().as_deref(), Some("c1"));

    client.disconnect().await;
}

#[tokio::test]
async fn intents_while_connecting_fail_without_sending() {
    let (mut client, _events, mut server) = start_client();

    assert!(matches!(
        client.create_room("alice"),
        Err(IntruderError::NotConnected)
    ));
    assert!(matches!(
        client.join_room("alice", "AB12CD"),
        Err(IntruderError::NotConnected)
    ));
    assert_eq!(client.session().phase, SessionPhase::NoRoom);
    assert_eq!(client.connection_state(), ConnectionState::Connecting);

    client.disconnect().await;
    assert!(server.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_handshake_fails_after_connect_timeout() {
    let started = Instant::now();
    let (client, mut events, server) = start_client();

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(client.connection_state(), ConnectionState::Connecting);

    let event = events.recv().await.unwrap();
    assert!(matches!(event, IntruderEvent::ConnectFailed { .. }));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(client.connection_state(), ConnectionState::Failed);
    assert!(server.is_closed());
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn connect_error_fails_the_connection() {
    let (client, mut events, server) = start_client();
    server.push(connect_error_json("server full"));

    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::ConnectFailed {
            reason: "server full".into()
        }
    );
    assert_eq!(client.connection_state(), ConnectionState::Failed);
    assert!(matches!(
        client.create_room("alice"),
        Err(IntruderError::NotConnected)
    ));
}

#[tokio::test]
async fn transport_error_before_handshake_is_a_connect_failure() {
    let (client, mut events, server) = start_client();
    server.fail("connection reset");

    let event = next_event(&mut events).await;
    assert!(
        matches!(event, IntruderEvent::ConnectFailed { ref reason } if reason.contains("connection reset")),
        "got {event:?}"
    );
    assert_eq!(client.connection_state(), ConnectionState::Failed);
}

#[tokio::test]
async fn server_close_while_in_room_resets_session() {
    let (client, mut events, server) = bob_in_room().await;
    server.close();

    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected { reason: None }
    );
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    let session = client.session();
    assert_eq!(session.phase, SessionPhase::NoRoom);
    assert!(session.room_code.is_none());
    assert!(session.players.is_empty());
    assert!(!session.is_host);
    assert!(events.recv().await.is_none());

    assert!(matches!(
        client.leave_room(),
        Err(IntruderError::NotConnected)
    ));
}

#[tokio::test]
async fn server_disconnect_event_carries_reason() {
    let (client, mut events, server) = connected_client("c1").await;
    server.push(disconnect_json(Some("server restarting")));

    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected {
            reason: Some("server restarting".into())
        }
    );
    assert!(server.is_closed());
    assert!(client.connection_id().is_none());
}

/// Server `disconnect` while in a room, with and without a payload.
async fn assert_disconnect_event_resets_room(frame: String, reason: Option<&str>) {
    let (client, mut events, server) = bob_in_room().await;
    server.push(frame);

    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected {
            reason: reason.map(str::to_string)
        }
    );
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    let session = client.session();
    assert_eq!(session.phase, SessionPhase::NoRoom);
    assert!(session.room_code.is_none());
    assert!(session.players.is_empty());
    assert!(!session.is_host);
    assert!(server.is_closed());
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn server_disconnect_event_while_in_room_resets_session() {
    assert_disconnect_event_resets_room(disconnect_json(Some("kicked")), Some("kicked")).await;
}

#[tokio::test]
async fn bare_disconnect_frame_while_in_room_resets_session() {
    assert_disconnect_event_resets_room(r#"{"type":"disconnect"}"#.to_string(), None).await;
}

#[tokio::test]
async fn bare_connect_frame_completes_the_handshake() {
    let (mut client, mut events, mut server) = start_client();
    server.push(r#"{"type":"connect"}"#);
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Connected {
            connection_id: None
        }
    );
    assert!(client.is_connected());
    assert!(client.connection_id().is_none());

    // Without an id this client can never be named host.
    client.create_room("alice").unwrap();
    server.next_sent().await;
    server.push(room_created_json("AB12CD", &[]));
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::RoomCreated { .. }
    ));
    server.push(room_host_json("c1"));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::HostChanged {
            host_id: "c1".into(),
            is_host: false
        }
    );
    client.disconnect().await;
}

#[tokio::test]
async fn bare_connect_error_frame_fails_the_connection() {
    let (client, mut events, server) = start_client();
    server.push(r#"{"type":"connect-error"}"#);
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::ConnectFailed { .. }
    ));
    assert_eq!(client.connection_state(), ConnectionState::Failed);
}

#[tokio::test]
async fn send_failure_disconnects() {
    let (client, mut events, server) = connected_client("c1").await;
    server.fail_sends();

    client.create_room("alice").unwrap();
    let event = next_event(&mut events).await;
    assert!(
        matches!(event, IntruderEvent::Disconnected { reason: Some(ref r) } if r.contains("send")),
        "got {event:?}"
    );
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.session().phase, SessionPhase::NoRoom);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (mut client, mut events, server) = bob_in_room().await;

    client.disconnect().await;
    client.disconnect().await;

    assert!(server.is_closed());
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected { .. }
    ));
    assert!(events.recv().await.is_none());
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(!client.session().in_room());
}

#[tokio::test]
async fn disconnect_before_any_handshake_is_safe() {
    let (mut client, mut events, _server) = start_client();
    client.disconnect().await;
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected { .. }
    ));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn restart_runs_a_fresh_connection() {
    let (mut client, mut old_events, _old_server) = bob_in_room().await;

    let (transport, server) = mock_pair();
    let mut events = client.restart(transport).await;

    // The old receiver ends with its own terminal event.
    assert!(matches!(
        next_event(&mut old_events).await,
        IntruderEvent::Disconnected { .. }
    ));
    assert!(old_events.recv().await.is_none());

    assert_eq!(client.connection_state(), ConnectionState::Connecting);
    assert_eq!(client.session().phase, SessionPhase::NoRoom);
    assert_eq!(client.session().local_display_name, "bob");

    server.push(connect_json("c9"));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Connected {
            connection_id: Some("c9".into())
        }
    );
    client.create_room("bob").unwrap();
    client.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Room lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_room_makes_this_client_host() {
    let (mut client, mut events, mut server) = connected_client("c1").await;

    assert_ok!(client.create_room("  alice "));
    assert_eq!(
        server.next_sent().await,
        ClientMessage::CreateRoom {
            display_name: "alice".into(),
            room_code: None,
        }
    );
    assert_eq!(client.session().phase, SessionPhase::Creating);

    server.push(room_created_json("AB12CD", &[]));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::RoomCreated {
            room_code: "AB12CD".into(),
            players: vec![Player::new("c1", "alice")],
        }
    );

    let session = client.session();
    assert_eq!(session.phase, SessionPhase::InRoom);
    assert_eq!(session.room_code.as_deref(), Some("AB12CD"));
    assert!(session.is_host);
    assert_eq!(session.local_player(), Some(&Player::new("c1", "alice")));

    client.disconnect().await;
}

#[tokio::test]
async fn create_with_proposed_code_sends_it_uppercased() {
    let (mut client, _events, mut server) = connected_client("c1").await;
    client.create_room_with_code("alice", "zz99zz").unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::CreateRoom {
            display_name: "alice".into(),
            room_code: Some("ZZ99ZZ".into()),
        }
    );
    client.disconnect().await;
}

#[tokio::test]
async fn join_room_uses_server_roster() {
    let (mut client, mut events, mut server) = connected_client("c2").await;

    assert_ok!(client.join_room("bob", " ab12cd "));
    assert_eq!(
        server.next_sent().await,
        ClientMessage::JoinRoom {
            display_name: "bob".into(),
            room_code: "AB12CD".into(),
        }
    );

    server.push(room_joined_json("AB12CD", &[alice(), bob()]));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::RoomJoined {
            room_code: "AB12CD".into(),
            players: vec![alice(), bob()],
            is_host: false,
        }
    );
    assert_eq!(client.players(), vec![alice(), bob()]);
    assert!(!client.is_host());

    client.disconnect().await;
}

#[tokio::test]
async fn join_unknown_room_reports_error_and_returns_to_no_room() {
    let (mut client, mut events, mut server) = connected_client("c2").await;
    client.join_room("bob", "NOPE00").unwrap();
    server.next_sent().await;

    server.push(error_json("Room not found", Some(ErrorCode::RoomNotFound)));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Error {
            message: "Room not found".into(),
            error_code: Some(ErrorCode::RoomNotFound),
            aborted: Some(PendingRequest::Join {
                room_code: "NOPE00".into()
            }),
        }
    );
    assert_eq!(client.session().phase, SessionPhase::NoRoom);

    // A fresh attempt is allowed right away.
    assert_ok!(client.join_room("bob", "AB12CD"));
    client.disconnect().await;
}

#[tokio::test]
async fn bare_string_error_is_surfaced() {
    let (mut client, mut events, server) = connected_client("c1").await;
    server.push(r#"{"type":"error","data":"Something went wrong"}"#);
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Error {
            message: "Something went wrong".into(),
            error_code: None,
            aborted: None,
        }
    );
    client.disconnect().await;
}

#[tokio::test]
async fn second_request_while_pending_is_rejected_locally() {
    let (mut client, _events, mut server) = connected_client("c1").await;
    client.create_room("alice").unwrap();
    assert!(matches!(server.next_sent().await, ClientMessage::CreateRoom { .. }));

    let err = assert_err!(client.join_room("alice", "AB12CD"));
    assert!(matches!(err, IntruderError::InvalidState { .. }));
    assert!(err.is_local());
    assert!(matches!(
        client.create_room("alice"),
        Err(IntruderError::InvalidState { .. })
    ));

    client.disconnect().await;
    assert!(server.drain_sent().is_empty());
}

#[tokio::test]
async fn blank_input_is_rejected() {
    let (mut client, _events, mut server) = connected_client("c1").await;
    assert!(matches!(
        client.create_room("   "),
        Err(IntruderError::InvalidInput(_))
    ));
    assert!(matches!(
        client.join_room("bob", ""),
        Err(IntruderError::InvalidInput(_))
    ));
    client.disconnect().await;
    assert!(server.drain_sent().is_empty());
}

#[tokio::test]
async fn leave_resets_immediately_and_ignores_late_events() {
    let (mut client, mut events, mut server) = bob_in_room().await;

    assert_ok!(client.leave_room());
    let session = client.session();
    assert_eq!(session.phase, SessionPhase::NoRoom);
    assert!(session.players.is_empty());
    assert_eq!(
        server.next_sent().await,
        ClientMessage::LeaveRoom {
            room_code: "AB12CD".into()
        }
    );

    // Late presence for the room we just left.
    server.push(player_joined_json(&carol()));
    server.push(room_host_json("c2"));
    assert_nothing_before_marker(&mut events, &server).await;
    assert!(client.players().is_empty());
    assert!(!client.is_host());

    client.disconnect().await;
}

#[tokio::test]
async fn leave_outside_a_room_is_invalid() {
    let (mut client, _events, _server) = connected_client("c1").await;
    assert!(matches!(
        client.leave_room(),
        Err(IntruderError::InvalidState { .. })
    ));
    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_create_times_out() {
    let config = IntruderConfig::default().with_request_timeout(Some(Duration::from_secs(10)));
    let (mut client, mut events, mut server) = start_client_with(config);
    server.push(connect_json("c1"));
    assert!(matches!(
        events.recv().await,
        Some(IntruderEvent::Connected { .. })
    ));

    let started = Instant::now();
    client.create_room("alice").unwrap();
    server.next_sent().await;

    assert_eq!(
        events.recv().await.unwrap(),
        IntruderEvent::RequestTimedOut {
            request: PendingRequest::Create
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(client.session().phase, SessionPhase::NoRoom);
    assert!(client.is_connected());

    // The confirmation arriving late is discarded.
    server.push(room_created_json("AB12CD", &[]));
    assert_nothing_before_marker(&mut events, &server).await;
    assert!(!client.session().in_room());

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn confirmed_request_does_not_time_out() {
    let (mut client, mut events, mut server) = connected_client("c2").await;
    client.join_room("bob", "AB12CD").unwrap();
    server.next_sent().await;
    server.push(room_joined_json("AB12CD", &[alice(), bob()]));
    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::RoomJoined { .. }
    ));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(events.try_recv().is_err());
    assert!(client.session().in_room());

    client.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Presence
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn player_join_and_leave_update_roster() {
    let (mut client, mut events, server) = bob_in_room().await;

    server.push(player_joined_json(&carol()));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::PlayerJoined {
            player: carol(),
            players: vec![alice(), bob(), carol()],
        }
    );

    server.push(player_left_json(&alice(), Some("AB12CD"), None));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::PlayerLeft {
            player: alice(),
            players: vec![bob(), carol()],
        }
    );
    assert_eq!(client.players(), vec![bob(), carol()]);

    client.disconnect().await;
}

#[tokio::test]
async fn roster_snapshot_replaces_local_roster() {
    let (mut client, mut events, server) = bob_in_room().await;
    server.push(player_left_json(&alice(), None, Some(&[bob(), carol()])));

    let event = next_event(&mut events).await;
    assert!(matches!(event, IntruderEvent::PlayerLeft { .. }));
    assert_eq!(client.players(), vec![bob(), carol()]);

    client.disconnect().await;
}

#[tokio::test]
async fn events_for_another_room_are_discarded() {
    let (mut client, mut events, server) = bob_in_room().await;
    server.push(player_left_json(&alice(), Some("OLD123"), Some(&[])));

    assert_nothing_before_marker(&mut events, &server).await;
    assert_eq!(client.players(), vec![alice(), bob()]);

    client.disconnect().await;
}

#[tokio::test]
async fn host_follows_connection_id() {
    let (mut client, mut events, server) = bob_in_room().await;

    // A different player who happens to share the local name.
    server.push(player_joined_json(&Player::new("c7", "bob")));
    next_event(&mut events).await;

    server.push(room_host_json("c7"));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::HostChanged {
            host_id: "c7".into(),
            is_host: false
        }
    );
    assert!(!client.is_host());

    server.push(room_host_json("c2"));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::HostChanged {
            host_id: "c2".into(),
            is_host: true
        }
    );
    assert!(client.is_host());

    client.disconnect().await;
}

#[tokio::test]
async fn malformed_frame_is_skipped() {
    let (mut client, mut events, server) = bob_in_room().await;
    server.push("not json");
    server.push(r#"{"type":"mystery","data":{}}"#);
    server.push(player_joined_json(&carol()));

    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::PlayerJoined { .. }
    ));
    client.disconnect().await;
}

#[tokio::test]
async fn full_event_channel_still_delivers_disconnect() {
    let config = IntruderConfig::default().with_event_channel_capacity(1);
    let (client, mut events, server) = start_client_with(config);
    server.push(connect_json("c2"));
    next_event(&mut events).await;

    client.join_room("bob", "AB12CD").unwrap();
    server.push(room_joined_json("AB12CD", &[alice(), bob()]));
    for i in 0..3 {
        server.push(player_joined_json(&Player::new(format!("x{i}"), "extra")));
    }
    server.close();

    assert!(matches!(
        next_event(&mut events).await,
        IntruderEvent::RoomJoined { .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        IntruderEvent::Disconnected { reason: None }
    );
    assert!(events.recv().await.is_none());
}
