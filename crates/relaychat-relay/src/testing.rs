//! In-memory [`Connection`] for unit tests.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use relaychat_transport::{Connection, ConnectionId, TransportError};

/// Records every payload sent to it. Can be switched into a broken state
/// where every send fails.
pub(crate) struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<Vec<u8>>>,
    broken: AtomicBool,
}

impl MockConnection {
    pub(crate) fn arc(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(id),
            sent: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
        })
    }

    pub(crate) fn break_pipe(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|b| String::from_utf8(b).unwrap())
            .collect()
    }
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(io::Error::from(
                io::ErrorKind::BrokenPipe,
            )));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
