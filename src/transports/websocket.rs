//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Both `ws://` and `wss://` endpoints are supported; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), image_intruder_client::IntruderError> {
//! use image_intruder_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:3001/ws").await?;
//! if let Some(Ok(handshake)) = transport.recv().await {
//!     println!("server said: {handshake}");
//! }
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::IntruderError;
use crate::transport::Transport;

/// The underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by one WebSocket connection.
///
/// Text frames carry protocol messages. Binary frames are accepted when they
/// hold UTF-8 JSON and skipped otherwise. [`recv`](Transport::recv) is
/// cancel-safe.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Dial the given `ws://` or `wss://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`IntruderError::InvalidUrl`] for URLs tungstenite rejects,
    /// [`IntruderError::Io`] when the socket cannot be opened, and
    /// [`IntruderError::ConnectFailed`] when the WebSocket upgrade fails.
    pub async fn connect(url: &str) -> Result<Self, IntruderError> {
        tracing::debug!(url = %url, "dialing room server");

        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(dial_error)?;

        tracing::info!(url = %url, status = %response.status(), "WebSocket connection established");
        Ok(Self::from_stream(stream))
    }

    /// Dial the given URL, failing with [`IntruderError::Timeout`] after `timeout`.
    ///
    /// # Errors
    ///
    /// [`IntruderError::Timeout`] if the deadline elapses, otherwise anything
    /// [`connect`](Self::connect) returns.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: Duration,
    ) -> Result<Self, IntruderError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| IntruderError::Timeout)?
    }

    /// Wrap an already-established stream (custom TLS, proxies, extra headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

fn dial_error(err: WsError) -> IntruderError {
    match err {
        WsError::Io(io) => IntruderError::Io(io),
        WsError::Url(url) => IntruderError::InvalidUrl(url.to_string()),
        other => IntruderError::ConnectFailed(other.to_string()),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), IntruderError> {
        if self.closed {
            return Err(IntruderError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| IntruderError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, IntruderError>> {
        while let Some(frame) = self.stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(IntruderError::TransportReceive(e.to_string()))),
            };

            match frame {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::warn!(len = bytes.len(), "skipping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    tracing::debug!(?frame, "server sent close frame");
                    return None;
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), IntruderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(IntruderError::TransportSend(e.to_string())),
        }
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket connection on a loopback port and run `handler` on it.
    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{addr}/ws")
    }

    #[test]
    fn transport_is_send_and_debug() {
        fn assert_bounds<T: Send + std::fmt::Debug>() {}
        assert_bounds::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn unreachable_host_is_io_error() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1/ws")
            .await
            .unwrap_err();
        assert!(matches!(err, IntruderError::Io(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        let err = WebSocketTransport::connect("not a url").await.unwrap_err();
        assert!(
            matches!(
                err,
                IntruderError::InvalidUrl(_)
                    | IntruderError::Io(_)
                    | IntruderError::ConnectFailed(_)
            ),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn receives_handshake_then_none_on_close() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Text(
                r#"{"type":"connect","data":{"connectionId":"c1"}}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        assert!(text.contains("connectionId"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn utf8_binary_frames_are_delivered_as_text() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Binary(vec![0xFF, 0xFE].into()))
                .await
                .unwrap();
            ws.send(Message::Binary(b"{\"type\":\"x\"}".to_vec().into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        assert_eq!(text, "{\"type\":\"x\"}");
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let url = serve_once(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("leave".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "leave");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_sends() {
        let url = serve_once(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
            .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, IntruderError::TransportClosed));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // TEST-NET-1 is non-routable: the dial hangs until the deadline, or
        // fails at once on hosts without a default route.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1/ws",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, IntruderError::Timeout | IntruderError::Io(_)),
            "got {err:?}"
        );
    }
}
