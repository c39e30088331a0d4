//! Message dispatch: routing one inbound payload to the bound callback.
//!
//! A [`ClientHandle`] holds at most one [`CallbackBinding`]. The binding
//! decides both how inbound payloads are decoded and how outbound text is
//! framed:
//!
//! - [`CallbackMode::Raw`] — payloads are undecoded text.
//! - [`CallbackMode::Structured`] — payloads are JSON documents; outbound
//!   text is wrapped in a [`MessageEnvelope`](relaychat_protocol::MessageEnvelope).

use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use relaychat_protocol::{Codec, JsonCodec, MessageEnvelope};
use serde_json::Value;

use crate::{ClientHandle, ListenError};

/// Longest prefix (in bytes) searched for a `name:` tag in raw text.
const MAX_RAW_NAME_LEN: usize = 64;

/// Which representation the bound callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallbackMode {
    #[default]
    Raw,
    Structured,
}

/// Application callbacks for inbound messages.
///
/// Only the method matching the bound [`CallbackMode`] is ever called.
/// Both default to doing nothing, so a handler implements just the one
/// it binds for.
///
/// Callbacks run on the task that called `listen()`, before `listen()`
/// returns. Calling `send` on `client` from inside a callback is fine;
/// calling `listen` is not (it would wait for the next message).
pub trait MessageHandler: Send + Sync + 'static {
    /// Called in raw mode with the payload text, the sender's display
    /// name (empty if unknown), and the arrival time.
    fn on_raw(&self, client: &ClientHandle, text: &str, name: &str, at: SystemTime) {
        let _ = (client, text, name, at);
    }

    /// Called in structured mode with the parsed document. The document
    /// is only borrowed for the duration of the call; clone what you
    /// need to keep.
    fn on_structured(&self, client: &ClientHandle, doc: &Value, at: SystemTime) {
        let _ = (client, doc, at);
    }
}

/// Adapts a closure into a raw-mode [`MessageHandler`].
pub fn raw_handler<F>(f: F) -> RawFn<F>
where
    F: Fn(&ClientHandle, &str, &str, SystemTime) + Send + Sync + 'static,
{
    RawFn(f)
}

/// Adapts a closure into a structured-mode [`MessageHandler`].
pub fn structured_handler<F>(f: F) -> StructuredFn<F>
where
    F: Fn(&ClientHandle, &Value, SystemTime) + Send + Sync + 'static,
{
    StructuredFn(f)
}

/// See [`raw_handler`].
pub struct RawFn<F>(F);

impl<F> MessageHandler for RawFn<F>
where
    F: Fn(&ClientHandle, &str, &str, SystemTime) + Send + Sync + 'static,
{
    fn on_raw(&self, client: &ClientHandle, text: &str, name: &str, at: SystemTime) {
        (self.0)(client, text, name, at)
    }
}

/// See [`structured_handler`].
pub struct StructuredFn<F>(F);

impl<F> MessageHandler for StructuredFn<F>
where
    F: Fn(&ClientHandle, &Value, SystemTime) + Send + Sync + 'static,
{
    fn on_structured(&self, client: &ClientHandle, doc: &Value, at: SystemTime) {
        (self.0)(client, doc, at)
    }
}

/// The active `{mode, handler}` pair of a client handle.
#[derive(Clone)]
pub struct CallbackBinding {
    pub mode: CallbackMode,
    pub handler: Arc<dyn MessageHandler>,
}

impl std::fmt::Debug for CallbackBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBinding")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// What a successful `listen()` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A message arrived and the bound callback ran.
    Dispatched,
    /// A message arrived but no callback was bound; it was dropped.
    Unbound,
    /// The listen timeout elapsed with no traffic.
    Idle,
}

/// Holds the binding and decodes payloads for it.
#[derive(Default)]
pub(crate) struct Dispatcher {
    binding: RwLock<Option<CallbackBinding>>,
    codec: JsonCodec,
}

impl Dispatcher {
    /// Replaces the binding. In-flight dispatches keep the binding they
    /// started with.
    pub(crate) fn bind(&self, binding: CallbackBinding) {
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = Some(binding);
    }

    pub(crate) fn current(&self) -> Option<CallbackBinding> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The mode outbound text is framed in. Raw until something is bound.
    pub(crate) fn mode(&self) -> CallbackMode {
        self.current().map(|b| b.mode).unwrap_or_default()
    }

    /// Decodes one payload and invokes exactly one callback for it.
    pub(crate) fn dispatch(
        &self,
        client: &ClientHandle,
        payload: &[u8],
        at: SystemTime,
    ) -> Result<Delivery, ListenError> {
        let Some(binding) = self.current() else {
            tracing::debug!(len = payload.len(), "no callback bound, dropping message");
            return Ok(Delivery::Unbound);
        };

        match binding.mode {
            CallbackMode::Raw => {
                // Invalid UTF-8 is delivered as an empty string.
                let text = std::str::from_utf8(payload).unwrap_or_default();
                let name = raw_display_name(&self.codec, text);
                binding.handler.on_raw(client, text, &name, at);
            }
            CallbackMode::Structured => {
                let doc: Value = self.codec.decode(payload).map_err(ListenError::Malformed)?;
                binding.handler.on_structured(client, &doc, at);
            }
        }
        Ok(Delivery::Dispatched)
    }
}

/// Best-effort sender name for raw text: the envelope's `user.name` if
/// the text is an envelope, else a short `name:` prefix, else empty.
fn raw_display_name(codec: &JsonCodec, text: &str) -> String {
    if text.trim_start().starts_with('{') {
        if let Ok(env) = codec.decode::<MessageEnvelope>(text.as_bytes()) {
            return env.user.name;
        }
    }
    match text.find(':') {
        Some(i) if i > 0 && i <= MAX_RAW_NAME_LEN => text[..i].trim().to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_name_from_prefix() {
        assert_eq!(raw_display_name(&JsonCodec, "alice: hi there"), "alice");
    }

    #[test]
    fn test_raw_name_from_envelope() {
        let json = r#"{"user":{"name":"bob"},"message":{"text":"hey","text_len":3,"info":0}}"#;
        assert_eq!(raw_display_name(&JsonCodec, json), "bob");
    }

    #[test]
    fn test_raw_name_missing() {
        assert_eq!(raw_display_name(&JsonCodec, "no tag here"), "");
        assert_eq!(raw_display_name(&JsonCodec, ":leading colon"), "");
        let long = format!("{}: tail", "x".repeat(MAX_RAW_NAME_LEN + 1));
        assert_eq!(raw_display_name(&JsonCodec, &long), "");
    }

    #[test]
    fn test_mode_defaults_to_raw_until_bound() {
        let dispatcher = Dispatcher::default();
        assert_eq!(dispatcher.mode(), CallbackMode::Raw);
        assert!(dispatcher.current().is_none());

        dispatcher.bind(CallbackBinding {
            mode: CallbackMode::Structured,
            handler: Arc::new(structured_handler(|_, _, _| {})),
        });
        assert_eq!(dispatcher.mode(), CallbackMode::Structured);
    }
}
