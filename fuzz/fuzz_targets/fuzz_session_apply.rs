#![no_main]

use std::collections::HashSet;

use image_intruder_client::protocol::ServerMessage;
use image_intruder_client::session::RoomSession;
use libfuzzer_sys::fuzz_target;

// Feed newline-separated frames through a session and check its invariants
// after every step.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut session = RoomSession::new();
    session.set_connection_id(Some("c1".into()));
    let _ = session.begin_join("fuzz", "AB12CD");
    session.mark_request_sent();

    for line in text.lines() {
        let Ok(msg) = serde_json::from_str::<ServerMessage>(line) else {
            continue;
        };
        session.apply(&msg);

        if session.is_host() {
            assert!(session.room_code().is_some());
        }
        let ids: HashSet<&str> = session.players().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), session.players().len());
    }
});
