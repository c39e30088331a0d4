//! The client handle: one outbound connection and its lifecycle.
//!
//! All methods take `&self`, so a handle wrapped in an `Arc` can be
//! listened on from one task while another task sends:
//!
//! ```text
//! listener task:  loop { client.listen().await }   ─┐
//! sender task:    client.send("hi").await           ├─ share one ClientHandle
//! any task:       client.disconnect().await        ─┘  (wakes the listener)
//! ```
//!
//! The state lives in a `watch` channel. `listen()` subscribes to it, so a
//! `disconnect()` from another task unblocks a pending `listen()` instead
//! of leaving it parked until the timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use relaychat_protocol::{Codec, JsonCodec, MessageEnvelope};
use relaychat_transport::{ClientConnection, Connection};
use tokio::sync::{watch, Mutex};

use crate::dispatch::Dispatcher;
use crate::{
    CallbackBinding, CallbackMode, ClientConfig, ClientIdentity, ConnectError,
    ConnectionState, Delivery, ListenError, MessageHandler, SendError,
};

/// Caller-owned handle for one end of a chat connection.
pub struct ClientHandle {
    identity: ClientIdentity,
    config: ClientConfig,
    codec: JsonCodec,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Arc<ClientConnection>>>,
    /// Bumped by every `disconnect()`; a dial that started in an older
    /// epoch must not install its connection.
    epoch: AtomicU64,
    dispatcher: Dispatcher,
}

impl ClientHandle {
    /// Creates a disconnected handle with the default [`ClientConfig`].
    pub fn new(identity: ClientIdentity) -> Self {
        Self::with_config(identity, ClientConfig::default())
    }

    /// Creates a disconnected handle.
    pub fn with_config(identity: ClientIdentity, config: ClientConfig) -> Self {
        Self {
            identity,
            config,
            codec: JsonCodec,
            state: watch::Sender::new(ConnectionState::Disconnected),
            link: Mutex::new(None),
            epoch: AtomicU64::new(0),
            dispatcher: Dispatcher::default(),
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// The currently bound callback mode (Raw when nothing is bound).
    pub fn mode(&self) -> CallbackMode {
        self.dispatcher.mode()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens the transport and moves the handle to `Connected`.
    ///
    /// # Errors
    /// - [`ConnectError::AlreadyConnected`] unless the handle is `Disconnected`
    /// - [`ConnectError::Unreachable`] / [`ConnectError::Refused`] /
    ///   [`ConnectError::Timeout`] if the transport can't be opened
    /// - [`ConnectError::Aborted`] if `disconnect()` ran meanwhile
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let mut current = ConnectionState::Disconnected;
        let claimed = self.state.send_if_modified(|state| {
            current = *state;
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ConnectError::AlreadyConnected(current));
        }
        let epoch = self.epoch.load(Ordering::Acquire);

        let url = self.identity.url();
        let timeout = self.config.connect_timeout;
        tracing::debug!(%url, name = self.identity.display_name(), "connecting");

        let conn = match tokio::time::timeout(timeout, ClientConnection::connect(&url)).await {
            Ok(Ok(conn)) => Arc::new(conn),
            Ok(Err(e)) => {
                self.abandon_connect();
                tracing::debug!(%url, error = %e, "connect failed");
                return Err(ConnectError::from_transport(e, timeout));
            }
            Err(_) => {
                self.abandon_connect();
                tracing::debug!(%url, ?timeout, "connect timed out");
                return Err(ConnectError::Timeout(timeout));
            }
        };

        let promoted = {
            let mut link = self.link.lock().await;
            let promoted = self.epoch.load(Ordering::Acquire) == epoch
                && self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Connected;
                        true
                    } else {
                        false
                    }
                });
            if promoted {
                *link = Some(Arc::clone(&conn));
            }
            promoted
        };
        if !promoted {
            // disconnect() ran while we were dialing.
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "close after aborted connect failed");
            }
            return Err(ConnectError::Aborted);
        }

        tracing::info!(%url, id = %conn.id(), "connected");

        if self.config.announce {
            let announcement = MessageEnvelope::announcement(self.identity.display_name());
            if let Err(e) = self.write_envelope(&conn, &announcement).await {
                tracing::warn!(error = %e, "failed to announce display name");
            }
        }
        Ok(())
    }

    /// Releases the transport and returns to `Disconnected`.
    ///
    /// Idempotent. Never fails: errors closing the transport are logged
    /// and dropped. A `listen()` pending on another task returns
    /// [`ListenError::Closed`].
    pub async fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let previous = self.state.send_replace(ConnectionState::Closing);
        let link = self.link.lock().await.take();
        self.finish_close(link).await;
        tracing::trace!(%previous, "handle reset");
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends `text`, framed according to the bound callback mode.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        self.send_bytes(text.as_bytes(), None).await
    }

    /// Sends `payload`, or its first `len` bytes when `len` is given.
    ///
    /// In structured mode the bytes are read as UTF-8 (lossily), trailing
    /// line endings are trimmed, and the text is wrapped in a
    /// [`MessageEnvelope`] carrying this handle's display name. In raw
    /// mode the bytes are sent verbatim.
    ///
    /// # Errors
    /// - [`SendError::NotConnected`] unless the handle is `Connected`
    /// - [`SendError::Length`] if `len` exceeds `payload.len()`; nothing
    ///   is written
    /// - [`SendError::Transport`] if the write fails; the handle stays
    ///   `Connected`
    pub async fn send_bytes(&self, payload: &[u8], len: Option<usize>) -> Result<(), SendError> {
        let conn = self.connection().await.ok_or(SendError::NotConnected)?;

        let body = match len {
            Some(n) if n > payload.len() => {
                return Err(SendError::Length {
                    requested: n,
                    available: payload.len(),
                });
            }
            Some(n) => &payload[..n],
            None => payload,
        };

        match self.dispatcher.mode() {
            CallbackMode::Raw => conn.send(body).await.map_err(SendError::Transport),
            CallbackMode::Structured => {
                let text = String::from_utf8_lossy(body);
                let text = text.trim_end_matches(['\r', '\n']);
                let envelope = MessageEnvelope::new(self.identity.display_name(), text);
                self.write_envelope(&conn, &envelope).await
            }
        }
    }

    /// Sends a prepared envelope as-is, whatever the callback mode.
    /// Use this to set `info` flags.
    pub async fn send_envelope(&self, envelope: &MessageEnvelope) -> Result<(), SendError> {
        let conn = self.connection().await.ok_or(SendError::NotConnected)?;
        self.write_envelope(&conn, envelope).await
    }

    async fn write_envelope(
        &self,
        conn: &ClientConnection,
        envelope: &MessageEnvelope,
    ) -> Result<(), SendError> {
        let bytes = self.codec.encode(envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Replaces the callback binding. Takes effect for the next payload
    /// `listen()` starts decoding, and for the next send.
    pub fn set_callback(&self, mode: CallbackMode, handler: impl MessageHandler) {
        self.dispatcher.bind(CallbackBinding {
            mode,
            handler: Arc::new(handler),
        });
    }

    /// Waits for one inbound message and dispatches it, or gives up after
    /// the listen timeout.
    ///
    /// Returns `Ok(Delivery::Idle)` on timeout: poll this in a loop and
    /// stop only on a terminal error.
    ///
    /// # Errors
    /// - [`ListenError::NotConnected`] unless the handle is `Connected`
    /// - [`ListenError::Closed`] if the peer closed, the transport failed,
    ///   or `disconnect()` was called meanwhile; the handle is then
    ///   `Disconnected`
    /// - [`ListenError::Malformed`] if a structured payload didn't parse
    pub async fn listen(&self) -> Result<Delivery, ListenError> {
        let conn = self.connection().await.ok_or(ListenError::NotConnected)?;
        let mut state_rx = self.state.subscribe();

        let received = tokio::select! {
            received = tokio::time::timeout(self.config.listen_timeout, conn.recv()) => received,
            _ = async { let _ = state_rx.wait_for(|state| !state.is_connected()).await; } => {
                tracing::debug!(id = %conn.id(), "listen interrupted by disconnect");
                return Err(ListenError::Closed);
            }
        };

        match received {
            Err(_elapsed) => Ok(Delivery::Idle),
            Ok(Ok(Some(payload))) => {
                tracing::trace!(id = %conn.id(), len = payload.len(), "message received");
                self.dispatcher.dispatch(self, &payload, SystemTime::now())
            }
            Ok(Ok(None)) => {
                tracing::info!(id = %conn.id(), "server closed the connection");
                self.remote_closed(&conn).await;
                Err(ListenError::Closed)
            }
            Ok(Err(e)) => {
                tracing::debug!(id = %conn.id(), error = %e, "receive failed");
                self.remote_closed(&conn).await;
                Err(ListenError::Closed)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// The live connection, if the handle is `Connected`.
    async fn connection(&self) -> Option<Arc<ClientConnection>> {
        if !self.state().is_connected() {
            return None;
        }
        self.link.lock().await.clone()
    }

    fn abandon_connect(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
    }

    /// Tears down after the peer went away, unless `disconnect()` or a
    /// reconnect already replaced the link.
    async fn remote_closed(&self, conn: &Arc<ClientConnection>) {
        let mut link = self.link.lock().await;
        if !link.as_ref().is_some_and(|current| Arc::ptr_eq(current, conn)) {
            return;
        }
        self.state.send_replace(ConnectionState::Closing);
        let taken = link.take();
        drop(link);
        self.finish_close(taken).await;
    }

    /// Closing → Disconnected: closes `link` (errors are logged only).
    async fn finish_close(&self, link: Option<Arc<ClientConnection>>) {
        if let Some(conn) = link {
            if let Err(e) = conn.close().await {
                tracing::debug!(id = %conn.id(), error = %e, "transport close failed");
            }
            tracing::info!(id = %conn.id(), "disconnected");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("mode", &self.mode())
            .finish()
    }
}
