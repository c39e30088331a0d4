//! Connection state and identity for a client handle.

use std::fmt;
use std::time::Duration;

use relaychat_protocol::DEFAULT_DISPLAY_NAME;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`ClientHandle`](crate::ClientHandle).
///
/// ```text
/// Disconnected ──connect──→ Connecting ──ok──→ Connected
///      ↑                        │                  │
///      └────────(failure)───────┘        (disconnect | remote close)
///      ↑                                           ▼
///      └────────────────────────────────────── Closing
/// ```
///
/// Both ways out of `Connected` pass through `Closing` while the
/// transport is closed. `send` and `listen` are only valid in `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    /// Returns `true` if messages may be sent or received.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientIdentity
// ---------------------------------------------------------------------------

/// Where to connect and who to appear as. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    host: String,
    port: u16,
    display_name: String,
}

impl ClientIdentity {
    /// Creates an identity. An empty `display_name` becomes
    /// [`DEFAULT_DISPLAY_NAME`].
    pub fn new(host: impl Into<String>, port: u16, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let display_name = if display_name.is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            display_name
        };
        Self {
            host: host.into(),
            port,
            display_name,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The WebSocket URL for this endpoint.
    pub fn url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("ws://[{}]:{}", self.host, self.port)
        } else {
            format!("ws://{}:{}", self.host, self.port)
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Tunables for a client handle.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long `connect()` waits for the transport and handshake.
    pub connect_timeout: Duration,

    /// How long one `listen()` call waits for a message before
    /// returning [`Delivery::Idle`](crate::Delivery::Idle).
    pub listen_timeout: Duration,

    /// Send the display-name announcement right after connecting.
    pub announce: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            listen_timeout: Duration::from_secs(50),
            announce: true,
        }
    }
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = timeout;
        self
    }

    pub fn with_announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }
}
