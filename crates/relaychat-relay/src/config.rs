//! Relay server configuration.

use std::time::Duration;

/// Address the relay binds when none is given.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9999";

/// Largest inbound message a participant may send, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

/// How long an accepted socket gets to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a relay server.
///
/// Everything except `bind_addr` is optional behavior layered on top of
/// plain fan-out.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host and port to listen on.
    pub bind_addr: String,

    /// Fixed system message (headless/self-test mode). When set it is
    /// sent to each new connection on join and back to the sender after
    /// every inbound message, in addition to the normal fan-out.
    pub system_message: Option<String>,

    /// Maximum simultaneous participants. `None` means unlimited.
    pub max_clients: Option<usize>,

    /// Inbound message size cap. A participant that exceeds it is
    /// disconnected. `None` means the WebSocket library's default.
    pub max_message_size: Option<usize>,

    /// Deadline for the opening handshake of each accepted socket.
    pub handshake_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            system_message: None,
            max_clients: None,
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}
