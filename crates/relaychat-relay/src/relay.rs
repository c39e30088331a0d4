//! The broadcast relay: join handling and per-message fan-out.
//!
//! For every inbound payload the relay:
//!
//! 1. Inspects it. Payloads that parse as a
//!    [`MessageEnvelope`] have their flags honored (rename, no-broadcast,
//!    send-back), `user.name` rewritten to the registered display name,
//!    `text_len` recomputed from `text`, and `info` cleared. Anything else is relayed verbatim.
//! 2. Fans it out to a snapshot of the registry, skipping the sender
//!    unless the envelope asked for `SEND_BACK`.
//! 3. Sends the configured system message back to the sender, if any.
//!
//! A failed send to one recipient is logged and counted, nothing more.
//! It never aborts delivery to the others, never reaches the sender, and
//! never touches the registry: that recipient's own handler notices the
//! broken connection and drops its guard.

use std::borrow::Cow;
use std::sync::Arc;

use futures_util::future::join_all;
use relaychat_protocol::{Codec, JsonCodec, MessageEnvelope, MessageFlags};
use relaychat_transport::{Connection, ConnectionId, TransportError};

use crate::{RegistryGuard, Registry, RelayConfig, RelayError};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOut {
    /// Recipients the payload was written to.
    pub delivered: usize,
    /// Recipients whose send failed.
    pub failed: usize,
}

/// How one inbound payload is routed.
struct Route<'a> {
    payload: Cow<'a, [u8]>,
    broadcast: bool,
    include_sender: bool,
}

impl<'a> Route<'a> {
    fn verbatim(payload: &'a [u8]) -> Self {
        Self {
            payload: Cow::Borrowed(payload),
            broadcast: true,
            include_sender: false,
        }
    }
}

/// Registry plus fan-out policy, shared by every connection handler.
pub struct Relay<C> {
    registry: Registry<C>,
    config: RelayConfig,
    codec: JsonCodec,
}

impl<C> Relay<C>
where
    C: Connection<Error = TransportError>,
{
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            codec: JsonCodec,
        }
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registers a freshly accepted connection and greets it with the
    /// system message, if one is configured.
    ///
    /// If the greeting fails the guard is dropped before returning, so
    /// the registry is left as it was.
    pub async fn join(&self, conn: &Arc<C>) -> Result<RegistryGuard<C>, RelayError> {
        let guard = self.registry.register(conn, self.config.max_clients)?;
        if let Some(message) = &self.config.system_message {
            conn.send(message.as_bytes()).await?;
            tracing::debug!(id = %conn.id(), "sent system message on join");
        }
        Ok(guard)
    }

    /// Handles one inbound payload from `sender`.
    ///
    /// # Errors
    /// Only a failure to send the system message back to `sender`
    /// itself; fan-out failures are reported in [`FanOut`].
    pub async fn relay(&self, sender: &C, payload: &[u8]) -> Result<FanOut, RelayError> {
        let origin = sender.id();
        let route = self.route(origin, payload);

        let fan_out = if route.broadcast {
            self.broadcast(origin, &route.payload, route.include_sender).await
        } else {
            FanOut::default()
        };
        tracing::debug!(
            %origin,
            len = payload.len(),
            delivered = fan_out.delivered,
            failed = fan_out.failed,
            "relayed message"
        );

        if let Some(message) = &self.config.system_message {
            sender.send(message.as_bytes()).await?;
        }
        Ok(fan_out)
    }

    /// Sends `payload` to every registered participant except `origin`
    /// (unless `include_origin`), concurrently.
    pub async fn broadcast(
        &self,
        origin: ConnectionId,
        payload: &[u8],
        include_origin: bool,
    ) -> FanOut {
        let recipients: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|p| include_origin || p.id != origin)
            .collect();

        let results = join_all(recipients.iter().map(|p| async move {
            (p.id, p.conn.send(payload).await)
        }))
        .await;

        let mut fan_out = FanOut::default();
        for (id, result) in results {
            match result {
                Ok(()) => fan_out.delivered += 1,
                Err(e) => {
                    fan_out.failed += 1;
                    tracing::debug!(%id, %origin, error = %e, "delivery failed, skipping");
                }
            }
        }
        fan_out
    }

    fn route<'a>(&self, origin: ConnectionId, payload: &'a [u8]) -> Route<'a> {
        if payload.first() != Some(&b'{') {
            return Route::verbatim(payload);
        }
        let Ok(mut envelope) = self.codec.decode::<MessageEnvelope>(payload) else {
            return Route::verbatim(payload);
        };

        let flags = envelope.flags();
        if flags.contains(MessageFlags::CHANGE_USERNAME) {
            self.registry.rename(origin, envelope.user.name.clone());
            tracing::info!(%origin, name = %envelope.user.name, "display name set");
        }
        if flags.contains(MessageFlags::NO_BROADCAST) {
            return Route {
                payload: Cow::Borrowed(payload),
                broadcast: false,
                include_sender: false,
            };
        }

        if let Some(name) = self.registry.display_name(origin) {
            envelope.user.name = name;
        }
        envelope.message.info = 0;
        if !envelope.is_consistent() {
            tracing::debug!(%origin, text_len = envelope.message.text_len, "correcting text_len");
            envelope.message.text_len = envelope.message.text.len();
        }

        match self.codec.encode(&envelope) {
            Ok(bytes) => Route {
                payload: Cow::Owned(bytes),
                broadcast: true,
                include_sender: flags.contains(MessageFlags::SEND_BACK),
            },
            Err(e) => {
                tracing::debug!(%origin, error = %e, "re-encoding envelope failed, relaying as-is");
                Route::verbatim(payload)
            }
        }
    }
}
