//! # Livewire
//!
//! A minimal real-time relay.
//!
//! Clients connect over a persistent bidirectional channel. Everyone
//! connected is told when a peer arrives or leaves, and every message a
//! client sends is decoded (JSON or protobuf, chosen once at startup) and
//! handed to an application hook. Messages that fail to decode are logged
//! and skipped; they never take the connection down.
//!
//! ## Architecture
//!
//! ```text
//! livewire-transport  → accept connections, move bytes
//! livewire-protocol   → turn bytes into a DecodedEvent
//! livewire-hub        → who is connected; "<peer> connected/disconnected"
//! livewire            → per-connection dispatch loop + server lifecycle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livewire::prelude::*;
//!
//! # async fn run() -> Result<(), LivewireError> {
//! let server = LivewireServer::builder()
//!     .bind("127.0.0.1:7777")
//!     .build(|peer: &str, event: DecodedEvent| println!("{peer}: {event}"))
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod dispatch;
mod error;
mod handler;
mod server;
mod sink;

pub use dispatch::{ConnectionState, DispatchStats, Dispatcher, MessageOutcome, StreamEnd};
pub use error::LivewireError;
pub use server::{LivewireServer, LivewireServerBuilder, DEFAULT_BIND, DEFAULT_DRAIN_TIMEOUT};
pub use sink::{EventSink, StdoutSink};

/// Everything needed to stand up a relay, in one import.
pub mod prelude {
    pub use crate::{
        DispatchStats, EventSink, LivewireError, LivewireServer, LivewireServerBuilder,
        StdoutSink,
    };
    pub use livewire_hub::{BroadcastReport, MemberGuard, Notice, Registry};
    pub use livewire_protocol::{
        DecodedEvent, Decoder, GameMessage, JsonDecoder, ProtobufDecoder, WireDecoder, WireFormat,
    };
    pub use livewire_transport::{
        Connection, ConnectionId, MemoryTransport, Transport, WebSocketTransport,
    };
}
