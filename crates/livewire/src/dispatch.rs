//! The per-connection dispatch loop.
//!
//! Reads a connection's inbound messages strictly in arrival order and
//! runs each one through the configured decoder:
//!
//! ```text
//! recv() ──→ decode ──ok──→ EventSink::deliver
//!   ↑           │
//!   │           └─err──→ error! log line, message dropped
//!   └───────────────────────────┘  (until the stream ends)
//! ```
//!
//! A message either reaches the sink or produces one log line, never
//! both. Decode failures never end the loop.

use livewire_protocol::{Decoder, ProtocolError, RawMessage};
use livewire_transport::Connection;

use crate::EventSink;

/// Where a connection is in its lifecycle.
///
/// Transitions only go forward:
///
/// ```text
/// Active ──(stream ends or errors)──→ Draining ──(evicted)──→ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading and dispatching messages.
    Active,
    /// The inbound stream is over; membership cleanup is pending.
    Draining,
    /// Evicted and announced. Terminal.
    Closed,
}

impl ConnectionState {
    /// The state after this one, or `None` from the terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Active => Some(Self::Draining),
            Self::Draining => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` for [`Closed`](Self::Closed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// What happened to one raw message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Decoded and handed to the sink.
    Delivered,
    /// Could not be decoded; logged and dropped.
    Failed(ProtocolError),
}

/// How a connection's inbound stream ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamEnd {
    /// The peer closed the connection.
    #[default]
    Closed,
    /// Reading failed (reset, protocol violation on the socket).
    Errored,
}

/// Per-connection counters returned when the dispatch loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages decoded and delivered to the sink.
    pub delivered: u64,
    /// Messages that failed to decode.
    pub failed: u64,
    /// Why the loop stopped.
    pub end: StreamEnd,
}

/// Decodes inbound messages with one strategy and feeds one sink.
///
/// One dispatcher is shared by every connection; [`run`](Self::run) is
/// called once per connection on that connection's own task.
pub struct Dispatcher<D: Decoder, S: EventSink> {
    decoder: D,
    sink: S,
}

impl<D: Decoder, S: EventSink> Dispatcher<D, S> {
    /// Creates a dispatcher from a decode strategy and an application hook.
    pub fn new(decoder: D, sink: S) -> Self {
        Self { decoder, sink }
    }

    /// The decode strategy in use.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// The application hook in use.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decodes one raw message from `peer` and routes the result.
    pub fn dispatch(&self, peer: &str, raw: &[u8]) -> MessageOutcome {
        match self.decoder.decode(raw) {
            Ok(event) => {
                self.sink.deliver(peer, event);
                MessageOutcome::Delivered
            }
            Err(e) => {
                tracing::error!(
                    peer,
                    format = %self.decoder.format(),
                    error = %e,
                    raw = %RawMessage(raw),
                    "unable to decode message"
                );
                MessageOutcome::Failed(e)
            }
        }
    }

    /// Consumes `conn`'s inbound messages until the stream ends.
    ///
    /// Never returns early on a bad message. A receive error ends the loop
    /// the same way a clean close does; the caller is responsible for
    /// membership cleanup in both cases.
    pub async fn run<C: Connection>(&self, conn: &C) -> DispatchStats {
        let mut stats = DispatchStats::default();
        loop {
            match conn.recv().await {
                Ok(Some(raw)) => match self.dispatch(conn.peer_label(), &raw) {
                    MessageOutcome::Delivered => stats.delivered += 1,
                    MessageOutcome::Failed(_) => stats.failed += 1,
                },
                Ok(None) => {
                    stats.end = StreamEnd::Closed;
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        conn_id = %conn.id(),
                        error = %e,
                        "receive failed, ending dispatch"
                    );
                    stats.end = StreamEnd::Errored;
                    break;
                }
            }
        }
        stats
    }
}
