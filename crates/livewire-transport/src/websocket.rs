//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// How long a client gets to finish the WebSocket upgrade by default.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Handshake = Result<WebSocketConnection, TransportError>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Upgrades run on their own tasks, so a client that opens a TCP
/// connection and then goes quiet never holds up the clients behind it.
pub struct WebSocketTransport {
    listener: TcpListener,
    shut_down: AtomicBool,
    handshake_timeout: Duration,
    // Only touched through `&mut self`; the mutex is there so the
    // transport stays `Sync`.
    pending: Mutex<JoinSet<Handshake>>,
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
            shut_down: AtomicBool::new(false),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Sets how long a client may take to complete the upgrade.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is actually bound to.
    ///
    /// Useful after binding to port `0`.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Performs the server side of the WebSocket upgrade for one TCP stream.
async fn handshake(stream: TcpStream, addr: SocketAddr, limit: Duration) -> Handshake {
    let ws = match tokio::time::timeout(limit, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            )));
        }
        Err(_) => {
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{addr} did not complete the WebSocket handshake"),
            )));
        }
    };

    let id = ConnectionId::next();
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    // Reader and writer get separate locks: the dispatcher parks on
    // the stream half while broadcasts go out through the sink half.
    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        peer: addr.to_string(),
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Yields the next connection whose upgrade has completed.
    ///
    /// Cancel-safe: a handshake in flight when this future is dropped keeps
    /// running and is returned by a later call.
    async fn accept(&mut self) -> Result<Option<Self::Connection>, Self::Error> {
        let pending = self.pending.get_mut();
        loop {
            if self.shut_down.load(Ordering::Acquire) {
                return Ok(None);
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.map_err(TransportError::AcceptFailed)?;
                    tracing::trace!(%addr, "TCP connection opened, upgrading");
                    pending.spawn(handshake(stream, addr, self.handshake_timeout));
                }
                Some(done) = pending.join_next(), if !pending.is_empty() => match done {
                    Ok(result) => return result.map(Some),
                    Err(e) => {
                        tracing::debug!(error = %e, "handshake task ended abnormally");
                    }
                },
            }
        }
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.shut_down.store(true, Ordering::Release);
        tracing::debug!("WebSocket transport stopped accepting");
        Ok(())
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn send_message(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.send_message(Message::Binary(data.to_vec().into())).await
    }

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.send_message(Message::text(text.to_owned())).await
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
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_label(&self) -> &str {
        &self.peer
    }
}
