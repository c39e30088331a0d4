//! Relay server for relaychat.
//!
//! The server keeps a [`Registry`] of connected participants and, for
//! each inbound message, fans it out to every other participant through
//! the [`Relay`]. Delivery failures are isolated per recipient.
//!
//! # How it fits together
//!
//! ```text
//! RelayServer (accept loop)
//!     │ spawn per connection
//!     ▼
//! handler ── join ──→ Registry (guard held by the handler)
//!     │ recv
//!     ▼
//! Relay::relay ── snapshot ──→ send to every other participant
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod relay;
mod server;
#[cfg(test)]
mod testing;

pub use config::{
    DEFAULT_BIND_ADDR, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, RelayConfig,
};
pub use error::RelayError;
pub use registry::{Participant, Registry, RegistryGuard};
pub use relay::{FanOut, Relay};
pub use server::{RelayServer, RelayServerBuilder};
