//! Error types for the client handle.
//!
//! Each operation has its own error enum so callers only match on the
//! failures that operation can actually produce.

use std::time::Duration;

use relaychat_protocol::ProtocolError;
use relaychat_transport::TransportError;

use crate::ConnectionState;

/// Errors returned by [`ClientHandle::connect`](crate::ClientHandle::connect).
///
/// Whatever the variant, a failed connect leaves the handle in
/// [`ConnectionState::Disconnected`], except for `AlreadyConnected`
/// which leaves the existing connection untouched.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The handle is not disconnected. Call `disconnect()` first.
    #[error("handle is already {0}")]
    AlreadyConnected(ConnectionState),

    /// The endpoint could not be resolved or reached.
    #[error("endpoint unreachable: {0}")]
    Unreachable(#[source] TransportError),

    /// The peer actively refused the connection or the handshake.
    #[error("connection refused: {0}")]
    Refused(#[source] TransportError),

    /// No connection was established within the connect timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// `disconnect()` was called while the connect was in flight.
    #[error("connect aborted by disconnect")]
    Aborted,
}

impl ConnectError {
    /// Classifies a transport failure by its socket-level error kind.
    pub(crate) fn from_transport(err: TransportError, timeout: Duration) -> Self {
        match err.io_kind() {
            std::io::ErrorKind::ConnectionRefused => Self::Refused(err),
            std::io::ErrorKind::TimedOut => Self::Timeout(timeout),
            _ => Self::Unreachable(err),
        }
    }
}

/// Errors returned by the `send*` family.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The handle is not connected.
    #[error("not connected")]
    NotConnected,

    /// The requested prefix is longer than the buffer. Nothing was written.
    #[error("requested {requested} bytes from a {available}-byte buffer")]
    Length { requested: usize, available: usize },

    /// Wrapping the payload into an envelope failed.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// The write failed. The handle stays connected; the caller decides
    /// whether to disconnect.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned by [`ClientHandle::listen`](crate::ClientHandle::listen).
///
/// A listen timeout is not an error; see [`Delivery::Idle`](crate::Delivery::Idle).
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    /// The handle is not connected.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the connection, the transport failed, or the
    /// handle was disconnected while listening. Terminal for this
    /// connection.
    #[error("connection closed")]
    Closed,

    /// A structured-mode payload could not be parsed. The message was
    /// dropped and no callback fired; the connection is still usable.
    #[error("malformed message: {0}")]
    Malformed(#[source] ProtocolError),
}

impl ListenError {
    /// Returns `true` if the connection is gone and polling should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::NotConnected)
    }
}
