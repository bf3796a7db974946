//! Room directory: the server's list of open rooms.
//!
//! The directory is a read-only view used before joining (does this code
//! exist?) and after creating (is my room listed yet?). Results are never
//! cached; every call asks the server again.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::room_code;

#[cfg(feature = "directory-http")]
pub mod http;

#[cfg(feature = "directory-http")]
pub use http::HttpRoomDirectory;

/// One listed room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDirectoryEntry {
    pub code: String,
    pub player_count: u32,
    /// Player names keyed by connection id.
    #[serde(default)]
    pub players: BTreeMap<String, String>,
}

/// Snapshot of the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomList {
    #[serde(default)]
    pub rooms: Vec<RoomDirectoryEntry>,
    #[serde(default)]
    pub total: u32,
}

impl RoomList {
    /// Find a room by code, ignoring case and surrounding whitespace.
    pub fn find(&self, code: &str) -> Option<&RoomDirectoryEntry> {
        self.rooms.iter().find(|room| room_code::same_room(&room.code, code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.find(code).is_some()
    }
}

/// Body of `GET /rooms`: `{"status": "...", "data": {"rooms": [...], "total": n}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomListResponse {
    #[serde(default)]
    pub status: String,
    pub data: RoomList,
}

/// Source of room listings.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Fetch the current list of rooms.
    async fn list_rooms(&self) -> Result<RoomList>;

    /// Returns `true` if a room with this code is listed.
    async fn room_exists(&self, code: &str) -> Result<bool> {
        Ok(self.list_rooms().await?.contains(code))
    }
}

/// A fixed listing. Handy offline and in tests.
#[async_trait]
impl RoomDirectory for RoomList {
    async fn list_rooms(&self) -> Result<RoomList> {
        Ok(self.clone())
    }
}
