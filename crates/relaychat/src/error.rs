//! Unified error type for relaychat.

use relaychat_client::{ConnectError, ListenError, SendError};
use relaychat_protocol::ProtocolError;
use relaychat_relay::RelayError;
use relaychat_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` impls let `?` lift any sub-crate error into this one.
#[derive(Debug, thiserror::Error)]
pub enum RelaychatError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client could not connect.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The client could not send.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The client's listen failed.
    #[error(transparent)]
    Listen(#[from] ListenError),

    /// A relay-side connection error.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ReceiveFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "gone",
        ));
        let top: RelaychatError = err.into();
        assert!(matches!(top, RelaychatError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_client_errors() {
        let top: RelaychatError = SendError::NotConnected.into();
        assert!(matches!(top, RelaychatError::Send(_)));
        let top: RelaychatError = ListenError::Closed.into();
        assert!(matches!(top, RelaychatError::Listen(_)));
        let top: RelaychatError = ConnectError::Aborted.into();
        assert_eq!(top.to_string(), "connect aborted by disconnect");
    }

    #[test]
    fn test_from_relay_error() {
        let top: RelaychatError = RelayError::Full(10).into();
        assert!(matches!(top, RelaychatError::Relay(_)));
        assert!(top.to_string().contains("10"));
    }
}
