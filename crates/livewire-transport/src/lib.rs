//! Transport abstraction layer for Livewire.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol a relay speaks. The relay core only ever sees
//! "a stream of inbound byte messages per connection" and "a way to send
//! bytes back", which is exactly what these traits describe.
//!
//! # Implementations
//!
//! - [`WebSocketTransport`] — WebSocket over TCP via `tokio-tungstenite`
//!   (behind the `websocket` feature, enabled by default)
//! - [`MemoryTransport`] — in-process channels, for tests and embedding
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector, MemoryPeer, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
///
/// Two handles refer to the same connection if and only if their ids are
/// equal, which is what membership in the hub is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// The returned futures are `Send` so that generic accept loops can be
/// spawned onto the Tokio runtime.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    ///
    /// Returns `Ok(None)` once the transport can never yield another
    /// connection (e.g. every connector was dropped).
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Option<Self::Connection>, Self::Error>> + Send;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
///
/// A connection is shared: the hub sends notices through it while the
/// dispatcher reads from it, so every method takes `&self`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends binary data to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Sends a text message to the remote peer.
    ///
    /// Defaults to sending the UTF-8 bytes through [`send`](Self::send).
    /// Transports with a distinct text frame (WebSocket) override this.
    fn send_text(&self, text: &str) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.send(text.as_bytes())
    }

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Human-readable identity of the remote end, e.g. `127.0.0.1:50312`.
    fn peer_label(&self) -> &str;
}
