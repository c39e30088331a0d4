//! # relaychat
//!
//! A minimal real-time text chat relay.
//!
//! - The **relay** ([`RelayServer`](relaychat_relay::RelayServer)) accepts
//!   WebSocket connections and rebroadcasts each inbound message to every
//!   other participant.
//! - The **client** ([`ClientHandle`](relaychat_client::ClientHandle))
//!   manages one connection and hands inbound messages to a callback in
//!   raw or structured form.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaychat::prelude::*;
//!
//! # async fn demo() -> Result<(), RelaychatError> {
//! let server = RelayServer::builder().bind("127.0.0.1:9999").build().await?;
//! tokio::spawn(server.run());
//!
//! let client = ClientHandle::new(ClientIdentity::new("127.0.0.1", 9999, "alice"));
//! client.set_callback(CallbackMode::Raw, raw_handler(|_, text, _, _| println!("{text}")));
//! client.connect().await?;
//! client.send("hello").await?;
//! client.listen().await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::RelaychatError;

pub use relaychat_client as client;
pub use relaychat_protocol as protocol;
pub use relaychat_relay as relay;
pub use relaychat_transport as transport;

/// The types most programs need.
pub mod prelude {
    pub use crate::RelaychatError;
    pub use relaychat_client::{
        raw_handler, structured_handler, CallbackMode, ClientConfig, ClientHandle,
        ClientIdentity, ConnectError, ConnectionState, Delivery, ListenError,
        MessageHandler, SendError,
    };
    pub use relaychat_protocol::{MessageEnvelope, MessageFlags};
    pub use relaychat_relay::{FanOut, RelayConfig, RelayServer, RelayServerBuilder};
}

/// Installs the `tracing` subscriber used by the binaries.
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
