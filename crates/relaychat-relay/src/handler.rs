//! Per-connection handler: handshake, join, relay loop, leave.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   0. Handshake, bounded by the configured timeout
//!   1. Join → registry entry created (guard held for the whole task)
//!   2. Loop: receive payload → relay to everyone else
//!   3. Close or error → guard dropped → entry removed

use std::io;
use std::sync::Arc;

use relaychat_transport::{
    Connection, Incoming, PendingConnection, TransportError, WebSocketConnection,
};

use crate::{Relay, RelayError};

/// Completes the WebSocket upgrade, then serves the connection.
///
/// A peer that never finishes the upgrade is dropped after
/// `handshake_timeout` without ever touching the registry.
pub(crate) async fn serve(
    pending: PendingConnection,
    relay: Arc<Relay<WebSocketConnection>>,
) -> Result<(), RelayError> {
    let peer = pending.peer_addr();
    let timeout = relay.config().handshake_timeout;

    let conn = match tokio::time::timeout(timeout, pending.handshake()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%peer, error = %e, "handshake failed");
            return Err(e.into());
        }
        Err(_) => {
            tracing::debug!(%peer, ?timeout, "handshake timed out");
            return Err(TransportError::HandshakeFailed(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no upgrade request within {timeout:?}"),
            ))
            .into());
        }
    };

    handle_connection(conn, relay).await
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    relay: Arc<Relay<WebSocketConnection>>,
) -> Result<(), RelayError> {
    let conn = Arc::new(conn);
    let id = conn.id();

    let guard = match relay.join(&conn).await {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(%id, error = %e, "rejecting connection");
            if let Err(close_err) = conn.close().await {
                tracing::debug!(%id, error = %close_err, "close after reject failed");
            }
            return Err(e);
        }
    };
    tracing::info!(
        %id,
        peer = ?conn.peer_addr(),
        participants = relay.registry().len(),
        "client connected"
    );

    let result = relay_loop(&conn, &relay).await;

    drop(guard);
    tracing::info!(%id, participants = relay.registry().len(), "client disconnected");
    result
}

async fn relay_loop(
    conn: &WebSocketConnection,
    relay: &Relay<WebSocketConnection>,
) -> Result<(), RelayError> {
    let id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(payload)) => {
                relay.relay(conn, &payload).await?;
            }
            Ok(None) => {
                tracing::debug!(%id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                return Ok(());
            }
        }
    }
}
