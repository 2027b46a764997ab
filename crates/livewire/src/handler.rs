//! Per-connection handler: join, dispatch, leave.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Join the registry → everyone (this connection included) hears
//!      "<peer> connected"
//!   2. Dispatch inbound messages until the stream ends
//!   3. Leave the registry → the remaining members hear
//!      "<peer> disconnected"
//!
//! Step 3 is owned by a [`MemberGuard`](livewire_hub::MemberGuard): if the
//! task panics in step 2 or is aborted during shutdown, the guard's `Drop`
//! performs the leave instead.

use std::sync::Arc;

use livewire_protocol::Decoder;
use livewire_transport::{Connection, ConnectionId};

use crate::dispatch::{ConnectionState, DispatchStats, StreamEnd};
use crate::server::ServerState;
use crate::EventSink;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, D, S>(
    conn: C,
    state: Arc<ServerState<C, D, S>>,
) -> DispatchStats
where
    C: Connection,
    D: Decoder,
    S: EventSink,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = conn.peer_label(), "handling new connection");

    // --- Step 1: Join ---
    let Some(guard) = state.registry.join(Arc::clone(&conn)).await else {
        tracing::warn!(%conn_id, "connection is already a member, not dispatching");
        return DispatchStats::default();
    };
    let mut lifecycle = ConnectionState::Active;

    if state.is_closing() {
        // Joined after shutdown swept the members; nobody else will close it.
        tracing::debug!(%conn_id, "joined during shutdown, closing");
        if let Err(e) = conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close during shutdown failed");
        }
    }

    // --- Step 2: Dispatch ---
    let stats = state.dispatcher.run(conn.as_ref()).await;
    lifecycle = advance(conn_id, lifecycle);

    if stats.end == StreamEnd::Errored {
        // The socket is unusable; make sure it's torn down before the
        // disconnect notice goes out to everyone else.
        if let Err(e) = conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close after receive error failed");
        }
    }

    // --- Step 3: Leave ---
    guard.release().await;
    lifecycle = advance(conn_id, lifecycle);
    debug_assert!(lifecycle.is_terminal());

    tracing::info!(
        %conn_id,
        peer = conn.peer_label(),
        delivered = stats.delivered,
        failed = stats.failed,
        end = ?stats.end,
        "connection closed"
    );
    stats
}

/// Moves `current` one step forward, logging the transition.
fn advance(conn_id: ConnectionId, current: ConnectionState) -> ConnectionState {
    match current.next() {
        Some(next) => {
            tracing::trace!(%conn_id, from = ?current, to = ?next, "connection state changed");
            next
        }
        None => current,
    }
}
