//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties together the
//! transport (accept), the registry, and the broadcast relay.

use std::future::Future;
use std::sync::Arc;

use relaychat_transport::{Transport, TransportError, WebSocketConnection, WebSocketTransport};

use crate::handler::serve;
use crate::{Relay, RelayConfig};

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use relaychat_relay::RelayServer;
///
/// # async fn demo() -> Result<(), relaychat_transport::TransportError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:9999")
///     .system_message("hello from the relay")
///     .build()
///     .await?;
/// server.run().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Enables headless mode with a fixed system message.
    pub fn system_message(mut self, message: impl Into<String>) -> Self {
        self.config.system_message = Some(message.into());
        self
    }

    /// Caps the number of simultaneous participants.
    pub fn max_clients(mut self, max: usize) -> Self {
        self.config.max_clients = Some(max);
        self
    }

    /// Caps inbound message size. `None` lifts the relay's own cap.
    pub fn max_message_size(mut self, max: Option<usize>) -> Self {
        self.config.max_message_size = max;
        self
    }

    /// Sets how long an accepted socket may take to upgrade.
    pub fn handshake_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Binds the listener. The server does not accept until
    /// [`RelayServer::run`] is called.
    pub async fn build(self) -> Result<RelayServer, TransportError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_max_message_size(self.config.max_message_size);
        Ok(RelayServer {
            transport,
            relay: Arc::new(Relay::new(self.config)),
        })
    }
}

/// A bound relay server.
pub struct RelayServer {
    transport: WebSocketTransport,
    relay: Arc<Relay<WebSocketConnection>>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared relay, for inspecting the registry while running.
    pub fn relay(&self) -> Arc<Relay<WebSocketConnection>> {
        Arc::clone(&self.relay)
    }

    /// Runs the accept loop until the process ends.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted socket is handshaken and served on its own task, so
    /// a peer that stalls during the upgrade never delays the next
    /// accept. A failing connection or accept never stops the loop.
    /// Shutdown drops the listener; connections already being served
    /// keep running until they close.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "relay server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("relay server shutting down");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let relay = Arc::clone(&self.relay);
                        tokio::spawn(async move {
                            if let Err(e) = serve(pending, relay).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
