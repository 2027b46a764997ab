//! Scoped membership: a join that is always matched by a leave.

use std::sync::Arc;

use livewire_transport::Connection;

use crate::Registry;

/// Proof of membership returned by [`Registry::join`].
///
/// Call [`release`](Self::release) when the connection's stream ends to
/// evict it and announce the departure. If the guard is dropped without
/// being released (the handler panicked, or its task was aborted during
/// shutdown) the same leave runs on a spawned task instead. Since `Drop`
/// is synchronous, that path is fire-and-forget.
#[must_use = "dropping the guard evicts the connection"]
pub struct MemberGuard<C: Connection> {
    registry: Arc<Registry<C>>,
    conn: Arc<C>,
    released: bool,
}

impl<C: Connection> MemberGuard<C> {
    pub(crate) fn new(registry: Arc<Registry<C>>, conn: Arc<C>) -> Self {
        Self {
            registry,
            conn,
            released: false,
        }
    }

    /// The connection this guard keeps registered.
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Evicts the connection and broadcasts its disconnect notice.
    ///
    /// Returns whether this call performed the eviction.
    pub async fn release(mut self) -> bool {
        let left = self.registry.leave(&self.conn).await;
        // Only mark released once the leave finished; a cancelled release
        // falls back to the drop path, and `leave` is idempotent.
        self.released = true;
        left
    }
}

impl<C: Connection> Drop for MemberGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let conn = Arc::clone(&self.conn);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.leave(&conn).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %conn.id(),
                    "member guard dropped outside a runtime, eviction skipped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use livewire_transport::MemoryConnection;

    use super::*;

    #[tokio::test]
    async fn test_release_evicts_once() {
        let registry = Arc::new(Registry::new());
        let (a, _pa) = MemoryConnection::pair("A");
        let a = Arc::new(a);

        let guard = registry.join(Arc::clone(&a)).await.unwrap();
        assert_eq!(guard.connection().id(), a.id());
        assert!(guard.release().await);
        assert!(!registry.contains(a.id()).await);
    }

    #[tokio::test]
    async fn test_drop_without_release_still_evicts_and_announces() {
        let registry = Arc::new(Registry::new());
        let (a, _pa) = MemoryConnection::pair("A");
        let (b, mut pb) = MemoryConnection::pair("B");
        let a = Arc::new(a);
        let b = Arc::new(b);

        let guard_a = registry.join(Arc::clone(&a)).await.unwrap();
        let _guard_b = registry.join(Arc::clone(&b)).await.unwrap();
        assert_eq!(pb.recv_text().await.as_deref(), Some("B connected"));

        drop(guard_a);

        let notice = tokio::time::timeout(Duration::from_secs(1), pb.recv_text())
            .await
            .expect("spawned leave should announce");
        assert_eq!(notice.as_deref(), Some("A disconnected"));
        assert!(!registry.contains(a.id()).await);
    }

    #[tokio::test]
    async fn test_drop_of_aborted_task_evicts() {
        let registry = Arc::new(Registry::new());
        let (a, _pa) = MemoryConnection::pair("A");
        let a = Arc::new(a);

        let task = {
            let registry = Arc::clone(&registry);
            let a = Arc::clone(&a);
            tokio::spawn(async move {
                let _guard = registry.join(a).await;
                std::future::pending::<()>().await;
            })
        };

        // Wait until the task has joined, then kill it mid-flight.
        while !registry.contains(a.id()).await {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while registry.contains(a.id()).await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("aborted task's guard should evict");
    }
}
