//! Client identity and server endpoint construction.
//!
//! Every client instance draws a random [`ClientId`] that namespaces its
//! connection path: `{scheme}://{host}[:port][/base]/ws/{client_id}`. The id is not
//! a credential.

use std::fmt;

use url::Url;

/// Exclusive upper bound for generated client ids.
const CLIENT_ID_RANGE: u128 = 1_000_000;

/// Port the game server listens on during local development.
pub const LOCAL_DEV_PORT: u16 = 8000;

/// Random per-instance identifier embedded in the endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Draw a fresh id in `0..1_000_000`.
    pub fn random() -> Self {
        // `CLIENT_ID_RANGE` fits in a u64, so the remainder does too.
        let bits = uuid::Uuid::new_v4().as_u128() % CLIENT_ID_RANGE;
        Self(u64::try_from(bits).unwrap_or_default())
    }

    /// Wrap a known id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WebSocket URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plaintext, used for local servers.
    Ws,
    /// TLS, used for remote deployments.
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

/// Base address of a game server, without the per-client path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
    /// Path prefix the server is mounted under, without a trailing slash.
    /// Empty when the server sits at the root.
    pub base_path: String,
}

impl Endpoint {
    /// Build an endpoint from its parts.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
            base_path: String::new(),
        }
    }

    /// Mount the client path under `path`, e.g. `/party`.
    pub fn with_base_path(mut self, path: &str) -> Self {
        let path = path.trim_matches('/');
        self.base_path = if path.is_empty() {
            String::new()
        } else {
            format!("/{path}")
        };
        self
    }

    /// Choose the server the way a browser page served from `page_host` would:
    /// `localhost` talks to the local dev server over plaintext, anything else
    /// talks to the same host over TLS.
    ///
    /// ```
    /// use edu_party_client::endpoint::Endpoint;
    ///
    /// assert_eq!(Endpoint::for_page_host("localhost").base_url(), "ws://localhost:8000");
    /// assert_eq!(Endpoint::for_page_host("party.example.com").base_url(), "wss://party.example.com");
    /// ```
    pub fn for_page_host(page_host: &str) -> Self {
        if page_host == "localhost" {
            Self::new(Scheme::Ws, "localhost", Some(LOCAL_DEV_PORT))
        } else {
            Self::new(Scheme::Wss, page_host, None)
        }
    }

    /// Parse a base URL such as `ws://localhost:8000`, `WSS://example.com/party`
    /// or `ws://[::1]:9001`.
    ///
    /// Returns `None` for schemes other than `ws`/`wss` or a missing host.
    /// A port equal to the scheme default is dropped. Query and fragment are
    /// ignored.
    pub fn parse(base_url: &str) -> Option<Self> {
        let url = Url::parse(base_url).ok()?;
        let scheme = match url.scheme() {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            _ => return None,
        };
        let host = url.host_str().filter(|host| !host.is_empty())?;

        Some(Self::new(scheme, host, url.port()).with_base_path(url.path()))
    }

    /// `{scheme}://{host}[:port][/base]`
    pub fn base_url(&self) -> String {
        let scheme = self.scheme.as_str();
        match self.port {
            Some(port) => format!("{scheme}://{}:{port}{}", self.host, self.base_path),
            None => format!("{scheme}://{}{}", self.host, self.base_path),
        }
    }

    /// Full connection URL for one client: `{base}/ws/{client_id}`.
    pub fn client_url(&self, client_id: ClientId) -> String {
        format!("{}/ws/{}", self.base_url(), client_id)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}
