//! The structured chat message that travels on the wire.
//!
//! ```text
//! { "user":    { "name": <string> },
//!   "message": { "text": <string>, "text_len": <integer>, "info": <integer> } }
//! ```
//!
//! `text_len` is the byte length of `text` (UTF-8). `info` is an opaque
//! application tag; the relay interprets its low bits as [`MessageFlags`].

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Display name used when a client does not supply one.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonym";

// ---------------------------------------------------------------------------
// MessageFlags
// ---------------------------------------------------------------------------

/// Routing bits carried in `message.info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageFlags(i64);

impl MessageFlags {
    /// No routing instructions: broadcast to everyone except the sender.
    pub const NONE: Self = Self(0);
    /// Do not fan the message out at all.
    pub const NO_BROADCAST: Self = Self(1 << 0);
    /// Deliver the message back to the sender as well.
    pub const SEND_BACK: Self = Self(1 << 1);
    /// Record `user.name` as the sender's display name on the relay.
    pub const CHANGE_USERNAME: Self = Self(1 << 2);

    /// Wraps a raw `info` value. Unknown bits are kept.
    pub const fn from_bits(bits: i64) -> Self {
        Self(bits)
    }

    /// Returns the raw `info` value.
    pub const fn bits(self) -> i64 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// MessageEnvelope
// ---------------------------------------------------------------------------

/// Who sent the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
}

/// The message text and its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub text: String,

    /// Byte length of `text`. Missing on the wire means 0.
    #[serde(default)]
    pub text_len: usize,

    /// Opaque application tag, see [`MessageFlags`].
    #[serde(default)]
    pub info: i64,
}

/// A structured chat message.
///
/// Build one with [`MessageEnvelope::new`] so `text_len` always matches
/// the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub user: UserInfo,
    pub message: MessageBody,
}

impl MessageEnvelope {
    /// Creates an envelope with `info = 0`.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            user: UserInfo { name: name.into() },
            message: MessageBody {
                text_len: text.len(),
                text,
                info: 0,
            },
        }
    }

    /// The control message a client sends right after connecting so the
    /// relay learns its display name without broadcasting anything.
    pub fn announcement(name: impl Into<String>) -> Self {
        Self::new(name, "null")
            .with_flags(MessageFlags::NO_BROADCAST | MessageFlags::CHANGE_USERNAME)
    }

    /// Replaces `info` with the given flags.
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.message.info = flags.bits();
        self
    }

    /// The routing flags carried in `info`.
    pub fn flags(&self) -> MessageFlags {
        MessageFlags::from_bits(self.message.info)
    }

    /// Returns `true` if `text_len` equals the byte length of `text`.
    pub fn is_consistent(&self) -> bool {
        self.message.text_len == self.message.text.len()
    }
}

impl fmt::Display for MessageEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.user.name, self.message.text)
    }
}
