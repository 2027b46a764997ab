//! In-process transport backed by Tokio channels.
//!
//! Each connection is a pair: the server side ([`MemoryConnection`]) which
//! implements [`Connection`], and the client side ([`MemoryPeer`]) which a
//! test drives by hand. Nothing touches the network, so tests built on this
//! transport are deterministic.
//!
//! ```text
//! MemoryConnector::connect() ──→ MemoryTransport::accept() ──→ MemoryConnection
//!          │                                                        ↕
//!          └──────────────────────→ MemoryPeer ←─────── (channels) ─┘
//! ```

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// A [`Transport`] whose connections are created by a [`MemoryConnector`].
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
}

/// Creates connections that a paired [`MemoryTransport`] will accept.
///
/// Cheap to clone. When every connector is dropped, `accept` yields
/// `Ok(None)` once the queue is drained.
#[derive(Clone)]
pub struct MemoryConnector {
    outgoing: mpsc::UnboundedSender<MemoryConnection>,
}

impl MemoryTransport {
    /// Creates a transport and the connector that feeds it.
    pub fn new() -> (Self, MemoryConnector) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { incoming: rx }, MemoryConnector { outgoing: tx })
    }
}

impl MemoryConnector {
    /// Opens a connection labelled `peer` and queues it for acceptance.
    ///
    /// # Errors
    /// Returns [`TransportError::Shutdown`] if the transport was dropped.
    pub fn connect(&self, peer: &str) -> Result<MemoryPeer, TransportError> {
        let (conn, peer) = MemoryConnection::pair(peer);
        self.outgoing
            .send(conn)
            .map_err(|_| TransportError::Shutdown)?;
        Ok(peer)
    }
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Option<Self::Connection>, Self::Error> {
        Ok(self.incoming.recv().await)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    peer: String,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: watch::Sender<bool>,
}

/// Client side of an in-memory connection.
///
/// Dropping the peer makes every later server-side send fail, which is how
/// tests model a client that vanished without a clean close.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryConnection {
    /// Creates a connected pair without going through a transport.
    pub fn pair(peer: &str) -> (Self, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let conn = Self {
            id: ConnectionId::next(),
            peer: peer.to_string(),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            closed,
        };
        let peer = MemoryPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
        };
        (conn, peer)
    }

    fn push(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(self.peer.clone()));
        }
        self.outbound
            .send(data)
            .map_err(|_| TransportError::ConnectionClosed(self.peer.clone()))
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.push(data.to_vec())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        // Subscribe before checking so a close racing with this call is
        // still observed through `changed()`.
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            msg = inbound.recv() => Ok(msg),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_label(&self) -> &str {
        &self.peer
    }
}

impl MemoryPeer {
    /// Sends a message to the server side. Returns `false` if the server
    /// side is gone or the peer already closed.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(data.into()).is_ok(),
            None => false,
        }
    }

    /// Ends the server side's inbound stream, like a clean close frame.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Waits for the next message the server sent to this peer.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Waits for the next message and decodes it as UTF-8 text.
    pub async fn recv_text(&mut self) -> Option<String> {
        let data = self.outbound.recv().await?;
        String::from_utf8(data).ok()
    }

    /// Returns the next already-delivered message, if any, without waiting.
    pub fn try_recv_text(&mut self) -> Option<String> {
        let data = self.outbound.try_recv().ok()?;
        String::from_utf8(data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_directions() {
        let (conn, mut peer) = MemoryConnection::pair("alice");
        assert_eq!(conn.peer_label(), "alice");

        assert!(peer.send(b"ping".to_vec()));
        assert_eq!(conn.recv().await.unwrap(), Some(b"ping".to_vec()));

        conn.send_text("pong").await.unwrap();
        assert_eq!(peer.recv_text().await.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream_after_draining() {
        let (conn, mut peer) = MemoryConnection::pair("bob");
        peer.send("last");
        peer.close();

        assert_eq!(conn.recv().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (conn, peer) = MemoryConnection::pair("carol");
        drop(peer);

        let err = conn.send(b"hello").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(ref p) if p == "carol"));
    }

    #[tokio::test]
    async fn test_server_close_wakes_pending_recv() {
        let (conn, _peer) = MemoryConnection::pair("dave");
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;
        conn.close().await.unwrap();

        let result = reader.await.unwrap().unwrap();
        assert!(result.is_none());
        assert!(conn.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_transport_accepts_until_connectors_dropped() {
        let (mut transport, connector) = MemoryTransport::new();
        let _peer = connector.connect("erin").unwrap();

        let conn = transport.accept().await.unwrap().expect("queued connection");
        assert_eq!(conn.peer_label(), "erin");

        drop(connector);
        assert!(transport.accept().await.unwrap().is_none());
    }
}
