//! Error types for the relay layer.

use relaychat_transport::{ConnectionId, TransportError};

/// Errors that end a single connection's handler. None of these stop the
/// server.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The relay is at its participant cap.
    #[error("relay is full ({0} participants)")]
    Full(usize),

    /// The connection is already registered.
    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// Writing to the connection's own transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
