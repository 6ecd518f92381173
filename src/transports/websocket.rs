//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] performs the handshake under a deadline and hands
//! back a [`WebSocketTransport`]. `ws://` is used for a local server and
//! `wss://` for a remote deployment; TLS goes through
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), edu_party_client::ClientError> {
//! use edu_party_client::{Connector, Transport, WebSocketConnector};
//!
//! let mut transport = WebSocketConnector::default()
//!     .connect("ws://localhost:8000/ws/4242")
//!     .await?;
//! transport.send(r#"{"command":"CREATE","username":"Ada"}"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("received: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::ClientError;
use crate::transport::{Connector, Transport, DEFAULT_CONNECT_TIMEOUT};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// What one incoming WebSocket message means for the game protocol.
enum Inbound {
    Frame(String),
    End,
    Skip,
}

impl From<Message> for Inbound {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::Frame(text.to_string()),
            Message::Close(frame) => {
                tracing::debug!(?frame, "server sent close frame");
                Self::End
            }
            // tungstenite queues the pong reply itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Self::Skip,
            Message::Binary(bytes) => {
                tracing::warn!(len = bytes.len(), "skipping binary frame");
                Self::Skip
            }
        }
    }
}

/// Map a handshake failure onto [`ClientError::Io`], keeping the I/O kind
/// when there is one.
fn handshake_error(error: WsError) -> ClientError {
    let kind = match &error {
        WsError::Io(io) => io.kind(),
        _ => std::io::ErrorKind::Other,
    };
    ClientError::Io(std::io::Error::new(kind, error))
}

/// A [`Transport`] over an open WebSocket. Built by [`WebSocketConnector`].
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: the stream only yields a message
/// from a completed poll, so a dropped `recv` future loses nothing.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => return Some(Err(ClientError::TransportReceive(e.to_string()))),
            };
            match Inbound::from(message) {
                Inbound::Frame(text) => return Some(Ok(text)),
                Inbound::End => return None,
                Inbound::Skip => {}
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        match self.stream.close(None).await {
            // The server got there first.
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(ClientError::TransportSend(e.to_string())),
        }
    }
}

/// [`Connector`] that opens a [`WebSocketTransport`], failing with
/// [`ClientError::Timeout`] if the handshake outlasts the deadline.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> Result<WebSocketTransport, ClientError> {
        tracing::debug!(url = %url, timeout = ?self.timeout, "connecting to game server");

        let handshake = tokio_tungstenite::connect_async(url);
        let (stream, _response) = tokio::time::timeout(self.timeout, handshake)
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(handshake_error)?;

        tracing::info!(url = %url, "WebSocket connection established");
        Ok(WebSocketTransport {
            stream,
            closed: false,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn default_connector_uses_default_timeout() {
        assert_eq!(WebSocketConnector::default().timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketConnector::default()
            .connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[tokio::test]
    async fn refused_connection_keeps_io_kind() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WebSocketConnector::default()
            .connect(&format!("ws://{addr}/ws/1"))
            .await
            .unwrap_err();
        match err {
            ClientError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_server_hits_handshake_timeout() {
        // Accepts TCP but never answers the upgrade request.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let connector = WebSocketConnector::new(Duration::from_millis(100));
        let err = connector
            .connect(&format!("ws://{addr}/ws/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
        server.abort();
    }

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns a client URL for it.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/ws/4242")
    }

    async fn connect(url: &str) -> WebSocketTransport {
        WebSocketConnector::default().connect(url).await.unwrap()
    }

    #[tokio::test]
    async fn recv_yields_text_frames_in_order_then_ends() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"type":"GAME_START"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"ELIMINATED"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connect(&url).await;
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"GAME_START"}"#
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"ELIMINATED"}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_and_ping_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Ping(vec![1].into())).await.unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connect(&url).await;
        assert_eq!(transport.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = connect(&url).await;
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, ClientError::TransportClosed));
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connect(&url).await;
        transport
            .send(r#"{"command":"START_GAME"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"command":"START_GAME"}"#
        );
    }
}
