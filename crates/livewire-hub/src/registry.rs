//! The membership registry: the set of live connections.
//!
//! This is the only state shared between connection tasks. It's
//! responsible for:
//! - Admitting a connection when its dispatcher starts
//! - Evicting it when its dispatcher stops
//! - Broadcasting text to everyone who is a member right now
//!
//! # Concurrency note
//!
//! Every operation goes through one `tokio::sync::Mutex`, so admits,
//! evicts and broadcast snapshots are serialized with respect to each
//! other. A broadcast holds the lock only long enough to clone the member
//! list; the sends happen after it is released, so a slow peer never
//! blocks a connect or disconnect elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use livewire_transport::{Connection, ConnectionId};
use tokio::sync::Mutex;

use crate::{MemberGuard, Notice};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members in the snapshot, i.e. delivery attempts made.
    pub attempted: usize,
    /// Attempts whose send failed (stale peer, closed socket).
    pub failed: usize,
}

impl BroadcastReport {
    /// Attempts that succeeded.
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed
    }
}

/// Tracks every live connection, keyed by [`ConnectionId`].
///
/// ## Lifecycle
///
/// ```text
/// join() ──→ admit() + "<peer> connected"  ──→ [member]
///                                                 │
/// leave() ─→ evict() + "<peer> disconnected" ←────┘
/// ```
///
/// Handles are stored as `Arc<C>` because a connection is shared: the
/// registry sends through it while its own dispatcher task reads from it.
pub struct Registry<C: Connection> {
    members: Mutex<HashMap<ConnectionId, Arc<C>>>,
}

impl<C: Connection> Registry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
        }
    }

    /// Adds `conn` to the membership set.
    ///
    /// Returns `false` and leaves the set untouched if a connection with
    /// the same id is already a member.
    pub async fn admit(&self, conn: Arc<C>) -> bool {
        let id = conn.id();
        let mut members = self.members.lock().await;
        if members.contains_key(&id) {
            tracing::warn!(conn_id = %id, "connection admitted twice, ignoring");
            return false;
        }
        members.insert(id, conn);
        tracing::debug!(conn_id = %id, members = members.len(), "member admitted");
        true
    }

    /// Removes the member with `id`, returning its handle.
    ///
    /// Evicting a non-member is a no-op that returns `None`.
    pub async fn evict(&self, id: ConnectionId) -> Option<Arc<C>> {
        let mut members = self.members.lock().await;
        let removed = members.remove(&id);
        if removed.is_some() {
            tracing::debug!(conn_id = %id, members = members.len(), "member evicted");
        }
        removed
    }

    /// Returns `true` if `id` is currently a member.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    /// Number of current members.
    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Returns `true` if there are no members.
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Ids of the current members, in no particular order.
    pub async fn members(&self) -> Vec<ConnectionId> {
        self.members.lock().await.keys().copied().collect()
    }

    /// Handles of the current members, cloned under the lock.
    pub async fn connections(&self) -> Vec<Arc<C>> {
        self.members.lock().await.values().cloned().collect()
    }

    /// Sends `text` to every connection that is a member at call time.
    ///
    /// Each member in the snapshot gets exactly one delivery attempt, and
    /// all attempts run concurrently. A failed send is logged and counted
    /// but never aborts the others; the failing connection's own
    /// disconnect path will evict it.
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let recipients = self.connections().await;
        let attempts = recipients.iter().map(|conn| async move {
            match conn.send_text(text).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(
                        conn_id = %conn.id(),
                        peer = conn.peer_label(),
                        error = %e,
                        "broadcast send failed"
                    );
                    false
                }
            }
        });
        let results = join_all(attempts).await;

        BroadcastReport {
            attempted: results.len(),
            failed: results.iter().filter(|ok| !**ok).count(),
        }
    }

    /// Admits `conn` and announces it to every member, itself included.
    ///
    /// Returns a guard that must be [released](MemberGuard::release) when
    /// the connection's stream ends. Returns `None` without announcing
    /// anything if `conn` is already a member.
    pub async fn join(self: &Arc<Self>, conn: Arc<C>) -> Option<MemberGuard<C>> {
        if !self.admit(Arc::clone(&conn)).await {
            return None;
        }
        let notice = Notice::Connected(conn.peer_label()).to_string();
        let report = self.broadcast(&notice).await;
        tracing::info!(
            conn_id = %conn.id(),
            peer = conn.peer_label(),
            notified = report.delivered(),
            "connection joined"
        );
        Some(MemberGuard::new(Arc::clone(self), conn))
    }

    /// Evicts `conn` and announces its departure to the remaining members.
    ///
    /// Idempotent: only the call that actually removes the member sends a
    /// notice. Returns whether this call removed it.
    pub async fn leave(&self, conn: &C) -> bool {
        if self.evict(conn.id()).await.is_none() {
            return false;
        }
        let notice = Notice::Disconnected(conn.peer_label()).to_string();
        let report = self.broadcast(&notice).await;
        tracing::info!(
            conn_id = %conn.id(),
            peer = conn.peer_label(),
            notified = report.delivered(),
            "connection left"
        );
        true
    }
}

impl<C: Connection> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}
