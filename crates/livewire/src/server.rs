//! `LivewireServer` builder and server loop.
//!
//! This is the entry point for running a Livewire relay. It ties together
//! all the layers: transport → registry → dispatcher → application hook.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livewire_hub::Registry;
use livewire_protocol::{Decoder, WireDecoder, WireFormat};
use livewire_transport::{
    Connection, Transport, TransportError, WebSocketTransport, DEFAULT_HANDSHAKE_TIMEOUT,
};
use tokio::task::{JoinError, JoinSet};

use crate::dispatch::{DispatchStats, Dispatcher};
use crate::handler::handle_connection;
use crate::{EventSink, LivewireError};

/// Address the builder binds to unless told otherwise.
pub const DEFAULT_BIND: &str = "localhost:7777";

/// How long shutdown waits for connection tasks before aborting them.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The registry
/// has its own `Arc` because the server keeps using it after the state's
/// last handler is gone, and member guards hold it too.
pub(crate) struct ServerState<C: Connection, D: Decoder, S: EventSink> {
    pub(crate) registry: Arc<Registry<C>>,
    pub(crate) dispatcher: Dispatcher<D, S>,
    /// Set before shutdown closes the current members. A handler that
    /// joins after that sweep sees it and closes its own connection.
    pub(crate) closing: AtomicBool,
}

impl<C: Connection, D: Decoder, S: EventSink> ServerState<C, D, S> {
    pub(crate) fn new(dispatcher: Dispatcher<D, S>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            dispatcher,
            closing: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Builder for configuring and starting a Livewire relay over WebSocket.
///
/// # Example
///
/// ```rust,no_run
/// use livewire::prelude::*;
///
/// # async fn run() -> Result<(), LivewireError> {
/// let server = LivewireServer::builder()
///     .bind("0.0.0.0:7777")
///     .format(WireFormat::Protobuf)
///     .build(StdoutSink)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LivewireServerBuilder {
    bind_addr: String,
    format: WireFormat,
    drain_timeout: Duration,
    handshake_timeout: Duration,
}

impl LivewireServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            format: WireFormat::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the wire format every connection is decoded with.
    pub fn format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets how long shutdown waits for connections to wind down.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets how long a client may take to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server around `sink`.
    ///
    /// # Errors
    /// Returns [`LivewireError::Transport`] if the address cannot be bound.
    pub async fn build<S: EventSink>(
        self,
        sink: S,
    ) -> Result<LivewireServer<WebSocketTransport, WireDecoder, S>, LivewireError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);
        let decoder = WireDecoder::from(self.format);
        Ok(LivewireServer::new(transport, decoder, sink).with_drain_timeout(self.drain_timeout))
    }
}

impl Default for LivewireServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Livewire relay.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct LivewireServer<T, D, S>
where
    T: Transport<Error = TransportError>,
    D: Decoder,
    S: EventSink,
{
    transport: T,
    state: Arc<ServerState<T::Connection, D, S>>,
    drain_timeout: Duration,
}

impl LivewireServer<WebSocketTransport, WireDecoder, crate::StdoutSink> {
    /// Creates a new builder.
    pub fn builder() -> LivewireServerBuilder {
        LivewireServerBuilder::new()
    }
}

impl<D: Decoder, S: EventSink> LivewireServer<WebSocketTransport, D, S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }
}

impl<T, D, S> LivewireServer<T, D, S>
where
    T: Transport<Error = TransportError>,
    D: Decoder,
    S: EventSink,
{
    /// Creates a server over an already-listening transport.
    pub fn new(transport: T, decoder: D, sink: S) -> Self {
        Self {
            transport,
            state: Arc::new(ServerState::new(Dispatcher::new(decoder, sink))),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Overrides the shutdown drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The membership registry every connection joins.
    pub fn registry(&self) -> &Arc<Registry<T::Connection>> {
        &self.state.registry
    }

    /// Runs the server until the transport stops producing connections and
    /// every connection has ended.
    ///
    /// Over WebSocket that means forever; use [`run_until`](Self::run_until)
    /// to stop on a signal.
    pub async fn run(self) -> Result<(), LivewireError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server until `shutdown` resolves, then shuts down
    /// gracefully.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// A failed accept is logged and the loop keeps going. When `shutdown`
    /// resolves:
    ///
    /// 1. the transport stops accepting,
    /// 2. every member connection is closed, so each handler sees its
    ///    stream end and leaves the registry normally,
    /// 3. handlers get up to the drain timeout to finish; stragglers are
    ///    aborted, and their member guards evict them.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), LivewireError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(format = %self.state.dispatcher.decoder().format(), "Livewire relay running");

        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();
        let mut shutdown_requested = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    shutdown_requested = true;
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(Some(conn)) => {
                        let state = Arc::clone(&self.state);
                        tasks.spawn(handle_connection(conn, state));
                    }
                    Ok(None) => {
                        tracing::info!("transport closed, no more connections");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
            while let Some(done) = tasks.try_join_next() {
                reap(done);
            }
        }

        self.transport.shutdown().await?;

        if !shutdown_requested {
            // Nothing new can arrive, but existing connections may run
            // on until they close or shutdown is requested after all.
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    done = tasks.join_next() => match done {
                        Some(done) => reap(done),
                        None => break,
                    },
                }
            }
        }

        self.drain(tasks).await;
        tracing::info!("Livewire relay stopped");
        Ok(())
    }

    /// Closes every member and waits for their handlers, up to the drain
    /// timeout.
    async fn drain(&self, mut tasks: JoinSet<DispatchStats>) {
        if tasks.is_empty() {
            return;
        }

        // Flag first, then sweep: a handler admitted after the sweep's
        // snapshot is guaranteed to observe the flag.
        self.state.closing.store(true, Ordering::SeqCst);
        let members = self.state.registry.connections().await;
        tracing::info!(
            members = members.len(),
            tasks = tasks.len(),
            "closing connections"
        );
        for conn in members {
            if let Err(e) = conn.close().await {
                tracing::debug!(conn_id = %conn.id(), error = %e, "close during shutdown failed");
            }
        }

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(done) = tasks.join_next().await {
                reap(done);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                timeout = ?self.drain_timeout,
                "drain timed out, aborting remaining connections"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

/// Logs the outcome of a finished handler task.
fn reap(done: Result<DispatchStats, JoinError>) {
    match done {
        Ok(stats) => {
            tracing::trace!(?stats, "connection task finished");
        }
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "connection task panicked");
        }
        Err(_) => {}
    }
}
