//! HTTP room directory (`GET /rooms`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{RoomDirectory, RoomList, RoomListResponse};
use crate::config::IntruderConfig;
use crate::error::{IntruderError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Queries the room server's directory endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRoomDirectory {
    client: Client,
    rooms_url: Url,
}

impl HttpRoomDirectory {
    /// Directory for the server named in `config`.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidUrl`] if the server URL is unusable.
    pub fn new(config: &IntruderConfig) -> Result<Self> {
        Ok(Self::with_url(config.rooms_url()?))
    }

    /// Directory at an explicit `rooms` URL.
    pub fn with_url(rooms_url: Url) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, rooms_url)
    }

    /// Reuse an existing `reqwest` client.
    pub fn with_client(client: Client, rooms_url: Url) -> Self {
        Self { client, rooms_url }
    }

    pub fn rooms_url(&self) -> &Url {
        &self.rooms_url
    }
}

#[async_trait]
impl RoomDirectory for HttpRoomDirectory {
    async fn list_rooms(&self) -> Result<RoomList> {
        tracing::debug!(url = %self.rooms_url, "listing rooms");

        let response = self
            .client
            .get(self.rooms_url.clone())
            .send()
            .await
            .map_err(|e| IntruderError::Directory(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntruderError::Directory(format!(
                "GET {} returned {status}: {body}",
                self.rooms_url
            )));
        }

        let listing: RoomListResponse = response
            .json()
            .await
            .map_err(|e| IntruderError::Directory(format!("invalid room list: {e}")))?;

        tracing::debug!(rooms = listing.data.rooms.len(), "room list received");
        Ok(listing.data)
    }
}
