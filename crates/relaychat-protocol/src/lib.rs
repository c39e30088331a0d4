//! Wire protocol for relaychat.
//!
//! This crate defines what a structured chat message looks like on the
//! wire and how it is turned into bytes:
//!
//! - **Types** ([`MessageEnvelope`], [`MessageFlags`]) — the structured
//!   payload exchanged in structured mode.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes and
//!   documents are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! Raw-mode payloads never pass through this crate; they travel as the
//! undecoded text the sender wrote.

mod codec;
mod envelope;
mod error;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::{MessageBody, MessageEnvelope, MessageFlags, UserInfo, DEFAULT_DISPLAY_NAME};
pub use error::ProtocolError;
