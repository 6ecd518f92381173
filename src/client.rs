//! Controller that ties the session, the connection and the view together.
//!
//! [`PartyClient`] owns exactly one [`Session`], one [`View`] and at most one
//! connection. It is the only consumer of the connection's signal channel,
//! so session transitions never run concurrently with each other.
//!
//! Intents (`login`, `create_lobby`, …) are synchronous: they update the
//! session, encode the resulting command and queue it on the connection
//! without waiting. Inbound traffic is processed by [`PartyClient::step`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::new(Endpoint::for_page_host("localhost"));
//! let mut client = PartyClient::websocket(config, my_view);
//!
//! client.login("Ada")?;
//! while client.step().await {
//!     if client.session().state() == SessionState::Menu {
//!         client.create_lobby()?;
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::{self, DecodeError};
use crate::connection::{
    self, CloseReason, ConnectionConfig, ConnectionHandle, ConnectionPhase, ConnectionSignal,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SIGNAL_CHANNEL_CAPACITY,
};
use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};
use crate::protocol::Command;
use crate::session::Session;
use crate::transport::{Connector, DEFAULT_CONNECT_TIMEOUT};
use crate::view::{Screen, View};

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`PartyClient`].
///
/// Only the server endpoint is required.
///
/// ```
/// use edu_party_client::client::ClientConfig;
/// use edu_party_client::endpoint::Endpoint;
/// use std::time::Duration;
///
/// let config = ClientConfig::new(Endpoint::for_page_host("localhost"))
///     .with_signal_channel_capacity(64)
///     .with_connect_timeout(Duration::from_secs(3));
/// assert_eq!(config.signal_channel_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Game server to connect to. The client id is appended per session.
    pub endpoint: Endpoint,
    /// Capacity of the bounded signal channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub signal_channel_capacity: usize,
    /// Time a graceful shutdown may take before the connection task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Time the connection handshake may take.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Configuration for `endpoint` with default tuning.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            signal_channel_capacity: DEFAULT_SIGNAL_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded signal channel (clamped to at least 1).
    #[must_use]
    pub fn with_signal_channel_capacity(mut self, capacity: usize) -> Self {
        self.signal_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            signal_channel_capacity: self.signal_channel_capacity,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

// ── Controller ──────────────────────────────────────────────────────

/// Single owner of the session state.
pub struct PartyClient<C: Connector, V: View> {
    connector: Arc<C>,
    config: ClientConfig,
    view: V,
    session: Session,
    connection: Option<ConnectionHandle>,
    signals: Option<mpsc::Receiver<ConnectionSignal>>,
}

#[cfg(feature = "transport-websocket")]
impl<V: View> PartyClient<crate::transports::WebSocketConnector, V> {
    /// A client that connects over WebSocket.
    pub fn websocket(config: ClientConfig, view: V) -> Self {
        let connector = crate::transports::WebSocketConnector::new(config.connect_timeout);
        Self::new(connector, config, view)
    }
}

impl<C: Connector, V: View> PartyClient<C, V> {
    /// A logged-out client. The view is switched to the login screen.
    pub fn new(connector: C, config: ClientConfig, mut view: V) -> Self {
        view.show_screen(Screen::Login);
        Self {
            connector: Arc::new(connector),
            config,
            view,
            session: Session::new(),
            connection: None,
            signals: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Phase of the current connection, `Idle` before login.
    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection
            .as_ref()
            .map_or(ConnectionPhase::Idle, ConnectionHandle::phase)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Log in and start connecting to `{endpoint}/ws/{client_id}`.
    ///
    /// # Errors
    ///
    /// See [`Session::login`].
    pub fn login(&mut self, username: &str) -> Result<()> {
        let client_id = self.session.login(username, &mut self.view)?.client_id();
        let url = self.config.endpoint.client_url(client_id);
        debug!(url = %url, "starting connection");

        let (handle, signals) = connection::start(
            Arc::clone(&self.connector),
            url,
            &self.config.connection_config(),
        );
        self.connection = Some(handle);
        self.signals = Some(signals);
        Ok(())
    }

    /// Create a lobby; this client assumes it will be the host.
    ///
    /// # Errors
    ///
    /// See [`Session::create_lobby`]; also fails if the frame cannot be queued.
    pub fn create_lobby(&mut self) -> Result<()> {
        let command = self.session.create_lobby()?;
        self.send(&command)
    }

    /// Join the lobby with `code`.
    ///
    /// # Errors
    ///
    /// See [`Session::join_lobby`]; also fails if the frame cannot be queued.
    pub fn join_lobby(&mut self, code: &str) -> Result<()> {
        let command = self.session.join_lobby(code, &mut self.view)?;
        self.send(&command)
    }

    /// Ask the server to start the game.
    ///
    /// # Errors
    ///
    /// See [`Session::start_game`]; also fails if the frame cannot be queued.
    pub fn start_game(&mut self) -> Result<()> {
        let command = self.session.start_game()?;
        self.send(&command)
    }

    /// Submit an answer for the current round.
    ///
    /// # Errors
    ///
    /// See [`Session::submit_input`]; also fails if the frame cannot be queued.
    pub fn submit_input(&mut self, input: &str) -> Result<()> {
        let command = self.session.submit_input(input, &mut self.view)?;
        self.send(&command)
    }

    /// Dismiss the round announcement.
    pub fn dismiss_announcement(&mut self) {
        self.session.dismiss_announcement(&mut self.view);
    }

    // ── Event processing ────────────────────────────────────────────

    /// Wait for the next connection signal and apply it.
    ///
    /// Returns `false` once there is nothing more to wait for: before login,
    /// or after the connection's final signal has been handled.
    ///
    /// # Cancel Safety
    ///
    /// Cancel-safe: a signal is either fully applied or left in the channel.
    pub async fn step(&mut self) -> bool {
        let Some(signals) = self.signals.as_mut() else {
            return false;
        };

        match signals.recv().await {
            Some(signal) => {
                self.handle_signal(signal);
                true
            }
            None => {
                // The task ended without a `Closed` signal (aborted).
                self.signals = None;
                self.session
                    .on_closed(&CloseReason::LocalShutdown, &mut self.view);
                false
            }
        }
    }

    /// Process signals until the connection is gone.
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Close the connection and apply the remaining signals.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.connection.as_mut() {
            handle.shutdown().await;
        }
        self.run().await;
    }

    /// Throw the session away and start over at the login screen with a
    /// fresh client id.
    pub async fn restart(&mut self) {
        self.signals = None;
        if let Some(mut handle) = self.connection.take() {
            handle.shutdown().await;
        }
        self.session = Session::new();
        debug!(client_id = %self.session.client_id(), "session restarted");
        self.view.show_screen(Screen::Login);
    }

    fn handle_signal(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Opened => self.session.on_opened(&mut self.view),
            ConnectionSignal::Message(frame) => match codec::decode(&frame) {
                Ok(event) => {
                    debug!(event = event.name(), "received event");
                    self.session.apply_event(event, &mut self.view);
                }
                Err(DecodeError::UnknownType(kind)) => {
                    warn!(?kind, "ignoring frame with unknown type");
                }
                Err(DecodeError::Malformed(e)) => {
                    warn!("dropping malformed frame: {e} (raw: {frame})");
                }
            },
            ConnectionSignal::Closed(reason) => {
                self.signals = None;
                self.session.on_closed(&reason, &mut self.view);
            }
        }
    }

    fn send(&self, command: &Command) -> Result<()> {
        let connection = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        let frame = codec::encode(command)?;
        debug!(command = command.name(), "queueing command");
        connection.send(frame)
    }
}

impl<C: Connector, V: View> std::fmt::Debug for PartyClient<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyClient")
            .field("state", &self.session.state())
            .field("phase", &self.connection_phase())
            .finish()
    }
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
    use crate::endpoint::Scheme;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new(Endpoint::for_page_host("localhost"));
        assert_eq!(config.endpoint.base_url(), "ws://localhost:8000");
        assert_eq!(config.signal_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_builder_methods() {
        let config = ClientConfig::new(Endpoint::new(Scheme::Wss, "example.com", None))
            .with_signal_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(2));
        assert_eq!(config.signal_channel_capacity, 1);
        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));

        let conn = config.connection_config();
        assert_eq!(conn.signal_channel_capacity, 1);
        assert_eq!(conn.shutdown_timeout, Duration::from_millis(250));
    }
}
