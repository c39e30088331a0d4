//! Client side of relaychat.
//!
//! A [`ClientHandle`] owns one connection to a relay and exposes the
//! connect / send / listen / disconnect lifecycle. Inbound messages are
//! handed to a [`MessageHandler`] in either raw-text or structured form,
//! chosen with [`ClientHandle::set_callback`].
//!
//! ```rust,no_run
//! use relaychat_client::{raw_handler, CallbackMode, ClientHandle, ClientIdentity};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientHandle::new(ClientIdentity::new("127.0.0.1", 9999, "alice"));
//! client.set_callback(
//!     CallbackMode::Raw,
//!     raw_handler(|_, text, name, _| println!("{name}> {text}")),
//! );
//! client.connect().await?;
//! client.send("hello").await?;
//! while !client.listen().await.is_err_and(|e| e.is_terminal()) {}
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod handle;
mod state;

pub use dispatch::{
    raw_handler, structured_handler, CallbackBinding, CallbackMode, Delivery,
    MessageHandler, RawFn, StructuredFn,
};
pub use error::{ConnectError, ListenError, SendError};
pub use handle::ClientHandle;
pub use state::{ClientConfig, ClientIdentity, ConnectionState};
