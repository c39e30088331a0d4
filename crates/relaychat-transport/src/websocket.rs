//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each connection splits its stream into a sink half and a stream half,
//! each behind its own lock. A task parked in [`Connection::recv`] holds
//! only the stream half, so sends and closes from other tasks go through.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// The connection type produced by [`WebSocketConnection::connect`].
pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    /// Caps the size of inbound messages on accepted connections.
    /// `None` keeps the `tungstenite` default.
    ///
    /// A peer that sends a larger message gets a receive error, which
    /// ends its connection.
    pub fn with_max_message_size(mut self, max: Option<usize>) -> Self {
        if let Some(max) = max {
            self.config = self
                .config
                .max_message_size(Some(max))
                .max_frame_size(Some(max));
        }
        self
    }

    /// Returns the address the listener is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = PendingConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP connection");
        Ok(PendingConnection {
            stream,
            addr,
            config: self.config,
        })
    }
}

/// An accepted TCP connection that has not sent its WebSocket upgrade
/// request yet.
pub struct PendingConnection {
    stream: TcpStream,
    addr: SocketAddr,
    config: WebSocketConfig,
}

impl PendingConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for PendingConnection {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn handshake(self) -> Result<Self::Connection, Self::Error> {
        let addr = self.addr;
        let ws = tokio_tungstenite::accept_async_with_config(self.stream, Some(self.config))
            .await
            .map_err(|e| {
                TransportError::HandshakeFailed(io::Error::new(
                    io::ErrorKind::InvalidData,
                    e,
                ))
            })?;

        let conn = WebSocketConnection::from_stream(ws, Some(addr));
        tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
        Ok(conn)
    }
}

/// A single WebSocket connection, either accepted or dialed.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl ClientConnection {
    /// Opens a WebSocket connection to `url` (e.g. `ws://127.0.0.1:9999`)
    /// and completes the opening handshake.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(connect_error)?;
        let conn = Self::from_stream(ws, None);
        tracing::debug!(id = %conn.id, url, "WebSocket handshake complete");
        Ok(conn)
    }
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn from_stream(ws: WebSocketStream<S>, peer: Option<SocketAddr>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: next_connection_id(),
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// The remote address, when known (accepted connections only).
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // Chat clients expect text frames; anything that isn't UTF-8
        // falls back to a binary frame.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| {
                TransportError::SendFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Keeps the socket-level error kind so callers can tell a refused
/// connection from an unreachable host.
fn connect_error(e: tungstenite::Error) -> TransportError {
    let io_err = match e {
        tungstenite::Error::Io(io_err) => io_err,
        tungstenite::Error::Url(url_err) => {
            io::Error::new(io::ErrorKind::InvalidInput, url_err)
        }
        other => io::Error::new(io::ErrorKind::ConnectionRefused, other),
    };
    TransportError::ConnectFailed(io_err)
}
