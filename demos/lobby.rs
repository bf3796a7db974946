//! # Lobby Demo
//!
//! Walks through a complete Image Intruder client lifecycle:
//!
//! 1. Connect to the room server over WebSocket
//! 2. Create a room, or join one after checking the room directory
//! 3. Print presence and host changes as they arrive
//! 4. Leave and disconnect on Ctrl+C or when the server goes away
//!
//! ## Running
//!
//! ```sh
//! # Start a room server on localhost:3001, then host a room:
//! cargo run --example lobby -- create alice
//!
//! # In another terminal, join it with the printed code:
//! cargo run --example lobby -- join bob AB12CD
//!
//! # Point at another server:
//! INTRUDER_ENV=production INTRUDER_SERVER_URL=https://rooms.example.com \
//!     cargo run --example lobby -- create alice
//! ```

use image_intruder_client::{
    HttpRoomDirectory, IntruderClient, IntruderConfig, IntruderError, IntruderEvent,
};

enum Mode {
    Create { name: String },
    Join { name: String, code: String },
}

fn parse_args() -> Option<Mode> {
    let mut args = std::env::args().skip(1);
    match (args.next()?.as_str(), args.next(), args.next()) {
        ("create", Some(name), None) => Some(Mode::Create { name }),
        ("join", Some(name), Some(code)) => Some(Mode::Join { name, code }),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(mode) = parse_args() else {
        eprintln!("usage: lobby create <name> | lobby join <name> <room-code>");
        std::process::exit(2);
    };

    // ── Configuration ───────────────────────────────────────────────
    let config = IntruderConfig::from_env();
    tracing::info!("Connecting to {}", config.websocket_url()?);
    let directory = HttpRoomDirectory::new(&config)?;

    // ── Connect ─────────────────────────────────────────────────────
    let (mut client, mut event_rx) = IntruderClient::connect(config).await?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    IntruderEvent::Connected { connection_id } => {
                        tracing::info!("Connected as {}", connection_id.as_deref().unwrap_or("(no id)"));
                        match &mode {
                            Mode::Create { name } => client.create_room(name)?,
                            Mode::Join { name, code } => {
                                match client.join_listed_room(&directory, name, code).await {
                                    Ok(()) => {}
                                    Err(e @ IntruderError::Protocol { .. }) => {
                                        tracing::error!("{e}");
                                        break;
                                    }
                                    Err(e) => return Err(e.into()),
                                }
                            }
                        }
                    }

                    IntruderEvent::RoomCreated { room_code, .. } => {
                        tracing::info!("Room {room_code} created; share this code");
                        if !client.created_room_is_listed(&directory).await? {
                            tracing::warn!("Room {room_code} is not listed yet");
                        }
                    }

                    IntruderEvent::RoomJoined { room_code, players, is_host } => {
                        tracing::info!(
                            "Joined room {room_code} ({} player(s), host={is_host})",
                            players.len()
                        );
                    }

                    IntruderEvent::PlayerJoined { player, players } => {
                        tracing::info!("{} joined ({} in room)", player.name, players.len());
                    }

                    IntruderEvent::PlayerLeft { player, players } => {
                        tracing::info!("{} left ({} in room)", player.name, players.len());
                    }

                    IntruderEvent::HostChanged { is_host, .. } => {
                        tracing::info!("Host changed; this client is host: {is_host}");
                    }

                    IntruderEvent::Error { message, error_code, aborted } => {
                        tracing::error!("Server error [{error_code:?}]: {message}");
                        if aborted.is_some() {
                            break;
                        }
                    }

                    IntruderEvent::RequestTimedOut { request } => {
                        tracing::error!("No reply to {request:?}");
                        break;
                    }

                    IntruderEvent::ConnectFailed { reason } => {
                        tracing::error!("Connection failed: {reason}");
                        break;
                    }

                    IntruderEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving");
                if client.session().in_room() {
                    client.leave_room()?;
                }
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    client.disconnect().await;
    tracing::info!("Client shut down");

    Ok(())
}
