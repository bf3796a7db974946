//! Client configuration.
//!
//! The only required setting is the room server URL, chosen per deployment
//! environment. Everything else has a default suited to the browser-era
//! behavior of the lobby (5 second connect bound, 10 second create/join bound).
//!
//! ```
//! use image_intruder_client::config::{Environment, IntruderConfig};
//!
//! let config = IntruderConfig::for_environment(Environment::Production, |key| {
//!     (key == "INTRUDER_SERVER_URL").then(|| "https://rooms.example.com".to_string())
//! });
//! assert_eq!(config.websocket_url().unwrap(), "wss://rooms.example.com/ws");
//! assert_eq!(config.rooms_url().unwrap().as_str(), "https://rooms.example.com/rooms");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{IntruderError, Result};

/// Variable selecting the deployment environment.
pub const ENVIRONMENT_VAR: &str = "INTRUDER_ENV";

/// Server URL used in production.
pub const PRODUCTION_URL_VAR: &str = "INTRUDER_SERVER_URL";

/// Server URL used in development.
pub const DEVELOPMENT_URL_VAR: &str = "INTRUDER_SERVER_URL_DEV";

/// Fallback server URL when no variable is set.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3001";

const DEFAULT_SOCKET_PATH: &str = "/ws";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Environment ─────────────────────────────────────────────────────

/// Deployment environment, which decides the server URL variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    /// Read [`ENVIRONMENT_VAR`]. Unset or unrecognized values mean development.
    pub fn from_env() -> Self {
        std::env::var(ENVIRONMENT_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Name of the variable holding the server URL for this environment.
    pub fn url_var(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_URL_VAR,
            Self::Development => DEVELOPMENT_URL_VAR,
        }
    }
}

impl FromStr for Environment {
    type Err = IntruderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(IntruderError::InvalidInput(format!(
                "unknown environment `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
        }
    }
}

// ── IntruderConfig ──────────────────────────────────────────────────

/// Configuration for an [`IntruderClient`](crate::IntruderClient).
///
/// # Example
///
/// ```
/// use image_intruder_client::IntruderConfig;
/// use std::time::Duration;
///
/// let config = IntruderConfig::new("http://localhost:3001")
///     .with_request_timeout(None)
///     .with_event_channel_capacity(64);
/// assert_eq!(config.connect_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct IntruderConfig {
    /// Room server base URL (`http`, `https`, `ws` or `wss`).
    pub server_url: String,
    /// Path of the socket endpoint, appended when `server_url` is HTTP(S).
    pub socket_path: String,
    /// Upper bound on the `Connecting` phase, covering the dial and the
    /// server's `connect` handshake. Defaults to **5 seconds**.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a `room-created` / `room-joined` reply.
    /// `None` waits forever. Defaults to **10 seconds**.
    pub request_timeout: Option<Duration>,
    /// Capacity of the bounded event channel. Defaults to **256**, minimum 1.
    ///
    /// When the consumer falls behind, non-terminal events are dropped with a
    /// warning. The final `Disconnected` / `ConnectFailed` event is always
    /// delivered.
    pub event_channel_capacity: usize,
    /// Time given to the transport loop to close gracefully on
    /// [`disconnect`](crate::IntruderClient::disconnect) before it is aborted.
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl IntruderConfig {
    /// Create a configuration for the given server URL with default values.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// [`ENVIRONMENT_VAR`] picks the environment, which picks the URL variable.
    pub fn from_env() -> Self {
        Self::for_environment(Environment::from_env(), |key| std::env::var(key).ok())
    }

    /// Build a configuration for `environment`, resolving variables through `lookup`.
    pub fn for_environment(
        environment: Environment,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let url = lookup(environment.url_var())
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        tracing::debug!(%environment, url = %url, "resolved room server url");
        Self::new(url)
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the create/join reply timeout. `None` disables it.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The `ws://` / `wss://` URL of the socket endpoint.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidUrl`] if `server_url` does not parse or uses an
    /// unsupported scheme.
    pub fn websocket_url(&self) -> Result<String> {
        let mut url = self.parse_server_url()?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" | "wss" => return Ok(url.into()),
            other => return Err(unsupported_scheme(other)),
        };
        set_scheme(&mut url, scheme)?;
        append_path(&mut url, &self.socket_path);
        Ok(url.into())
    }

    /// The `GET /rooms` URL of the room directory, on the same host.
    ///
    /// # Errors
    ///
    /// [`IntruderError::InvalidUrl`] if `server_url` does not parse or uses an
    /// unsupported scheme.
    pub fn rooms_url(&self) -> Result<Url> {
        let mut url = self.parse_server_url()?;
        let scheme = match url.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => return Err(unsupported_scheme(other)),
        };
        set_scheme(&mut url, scheme)?;
        let socket_path = self.socket_path.trim_end_matches('/');
        if !socket_path.is_empty() {
            if let Some(base) = url.path().strip_suffix(socket_path).map(str::to_string) {
                url.set_path(&base);
            }
        }
        append_path(&mut url, "/rooms");
        Ok(url)
    }

    fn parse_server_url(&self) -> Result<Url> {
        Url::parse(self.server_url.trim())
            .map_err(|e| IntruderError::InvalidUrl(format!("{}: {e}", self.server_url)))
    }
}

impl Default for IntruderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

fn unsupported_scheme(scheme: &str) -> IntruderError {
    IntruderError::InvalidUrl(format!("unsupported scheme `{scheme}`"))
}

fn set_scheme(url: &mut Url, scheme: &str) -> Result<()> {
    url.set_scheme(scheme)
        .map_err(|()| IntruderError::InvalidUrl(format!("cannot switch scheme to `{scheme}`")))
}

fn append_path(url: &mut Url, suffix: &str) {
    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        suffix.trim_start_matches('/')
    );
    url.set_path(&joined);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = IntruderConfig::new("http://localhost:3001");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.socket_path, "/ws");
    }

    #[test]
    fn event_channel_capacity_is_clamped() {
        let config = IntruderConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn environment_selects_url_variable() {
        let lookup = lookup_from(&[
            (PRODUCTION_URL_VAR, "https://prod.example.com"),
            (DEVELOPMENT_URL_VAR, "http://dev.example.com:3001"),
        ]);
        let prod = IntruderConfig::for_environment(Environment::Production, &lookup);
        let dev = IntruderConfig::for_environment(Environment::Development, &lookup);
        assert_eq!(prod.server_url, "https://prod.example.com");
        assert_eq!(dev.server_url, "http://dev.example.com:3001");
    }

    #[test]
    fn missing_or_blank_variable_falls_back_to_default() {
        let config =
            IntruderConfig::for_environment(Environment::Production, lookup_from(&[(PRODUCTION_URL_VAR, "  ")]));
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(
            " Production ".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn websocket_url_from_http_base() {
        let config = IntruderConfig::new("http://localhost:3001");
        assert_eq!(config.websocket_url().unwrap(), "ws://localhost:3001/ws");

        let config = IntruderConfig::new("https://example.com/game/");
        assert_eq!(config.websocket_url().unwrap(), "wss://example.com/game/ws");
    }

    #[test]
    fn websocket_url_keeps_explicit_socket_url() {
        let config = IntruderConfig::new("wss://example.com/socket");
        assert_eq!(config.websocket_url().unwrap(), "wss://example.com/socket");
    }

    #[test]
    fn rooms_url_strips_socket_path() {
        let config = IntruderConfig::new("ws://localhost:3001/ws");
        assert_eq!(
            config.rooms_url().unwrap().as_str(),
            "http://localhost:3001/rooms"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let config = IntruderConfig::new("ftp://example.com");
        assert!(matches!(
            config.websocket_url(),
            Err(IntruderError::InvalidUrl(_))
        ));
        assert!(matches!(config.rooms_url(), Err(IntruderError::InvalidUrl(_))));
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let config = IntruderConfig::new("not a url");
        assert!(matches!(
            config.websocket_url(),
            Err(IntruderError::InvalidUrl(_))
        ));
    }
}
