/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening an outbound connection failed.
    ///
    /// The inner error's [`kind`](std::io::Error::kind) tells callers
    /// whether the peer refused the connection or could not be reached.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed, including inbound messages over the size
    /// limit.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// An accepted peer did not complete the opening handshake.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns the [`std::io::ErrorKind`] behind this error.
    pub fn io_kind(&self) -> std::io::ErrorKind {
        match self {
            Self::ConnectFailed(e)
            | Self::SendFailed(e)
            | Self::ReceiveFailed(e)
            | Self::AcceptFailed(e)
            | Self::HandshakeFailed(e) => e.kind(),
        }
    }
}
