//! Transport abstraction for the EDU PARTY wire protocol.
//!
//! The [`Transport`] trait is a bidirectional channel of UTF-8 text frames,
//! one JSON object per frame. The [`Connector`] trait performs the connection
//! setup that produces a transport, so the connection manager can own the
//! whole `Connecting → Online` step without knowing which backend it drives.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use edu_party_client::error::ClientError;
//! use edu_party_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), ClientError> {
//!         // Write one text frame
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         // Return None when the server closed the connection cleanly
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         unimplemented!()
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientError;

/// Default time allowed for a [`Connector`] to establish a transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A bidirectional text frame transport.
///
/// Frames must be delivered in send order.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the connection
/// task polls it inside `tokio::select!`. Dropping a pending `recv` must not
/// lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the frame could not be written,
    /// or [`ClientError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, frame: String) -> Result<(), ClientError>;

    /// Receive the next text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Establishes a [`Transport`] to a connection URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced on success.
    type Transport: Transport;

    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns whatever error prevented the connection, typically
    /// [`ClientError::Io`] or [`ClientError::Timeout`].
    async fn connect(&self, url: &str) -> Result<Self::Transport, ClientError>;
}
