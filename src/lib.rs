//! # EDU PARTY Client
//!
//! Client session protocol and state machine for EDU PARTY, a round-based
//! multiplayer party game. Players log in, create or join a lobby by code,
//! and answer per-round instructions until they are eliminated or the game
//! ends.
//!
//! The crate is split the way the traffic flows:
//!
//! - [`protocol`] / [`codec`]: the flat JSON wire format
//! - [`transport`] / [`transports`]: text-frame transports (WebSocket built in)
//! - [`connection`]: the background connection task and its signal stream
//! - [`session`]: the client-side state machine
//! - [`view`]: the rendering contract the session pushes into
//! - [`client`]: [`PartyClient`], the single owner that ties them together
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   `WebSocketTransport` and `WebSocketConnector`
//! - **Headless**: the session never touches a UI toolkit, only the [`View`] trait
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edu_party_client::{ClientConfig, Endpoint, PartyClient};
//!
//! let config = ClientConfig::new(Endpoint::for_page_host("localhost"));
//! let mut client = PartyClient::websocket(config, MyView::default());
//!
//! client.login("Ada")?;
//! client.run().await;
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;
pub mod view;

// Re-export primary types for ergonomic imports.
pub use client::{ClientConfig, PartyClient};
pub use codec::DecodeError;
pub use connection::{CloseReason, ConnectionPhase, ConnectionSignal};
pub use endpoint::{ClientId, Endpoint};
pub use error::{ClientError, InputError};
pub use protocol::{Command, PlayerEntry, ServerEvent};
pub use session::{Outcome, Session, SessionState};
pub use transport::{Connector, Transport};
pub use view::{Screen, View};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
