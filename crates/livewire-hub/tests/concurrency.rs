//! Concurrency tests for the membership registry.
//!
//! These run on a multi-threaded runtime so joins, leaves and broadcasts
//! from different tasks really do overlap.

use std::sync::Arc;

use livewire_hub::Registry;
use livewire_transport::{Connection, MemoryConnection, MemoryPeer};

const CHURNERS: usize = 32;

fn drain(peer: &mut MemoryPeer) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(text) = peer.try_recv_text() {
        out.push(text);
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stable_member_sees_every_churn_notice_exactly_once() {
    let registry = Arc::new(Registry::new());
    let (observer, mut observer_peer) = MemoryConnection::pair("observer");
    let observer = Arc::new(observer);
    let observer_guard = registry.join(Arc::clone(&observer)).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..CHURNERS {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let (conn, mut peer) = MemoryConnection::pair(&format!("churn-{i}"));
            let conn = Arc::new(conn);
            let guard = registry.join(Arc::clone(&conn)).await.unwrap();
            registry.broadcast(&format!("chatter from churn-{i}")).await;
            tokio::task::yield_now().await;
            assert!(guard.release().await);
            drain(&mut peer)
        }));
    }

    let mut churn_inboxes = Vec::new();
    for (i, task) in tasks.into_iter().enumerate() {
        churn_inboxes.push((i, task.await.expect("churn task should not panic")));
    }

    // Each churner saw its own arrival exactly once and never its own exit.
    for (i, inbox) in &churn_inboxes {
        let own_connect = format!("churn-{i} connected");
        let own_disconnect = format!("churn-{i} disconnected");
        assert_eq!(inbox.iter().filter(|m| **m == own_connect).count(), 1);
        assert!(!inbox.contains(&own_disconnect));
    }

    // The observer was a member throughout, so every snapshot included it.
    let observed = drain(&mut observer_peer);
    assert_eq!(observed[0], "observer connected");
    for i in 0..CHURNERS {
        for suffix in ["connected", "disconnected"] {
            let notice = format!("churn-{i} {suffix}");
            assert_eq!(
                observed.iter().filter(|m| **m == notice).count(),
                1,
                "observer should see {notice:?} once"
            );
        }
        let chatter = format!("chatter from churn-{i}");
        assert_eq!(observed.iter().filter(|m| **m == chatter).count(), 1);
    }

    assert_eq!(registry.members().await, vec![observer.id()]);
    assert!(observer_guard.release().await);
    assert!(registry.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_during_churn_is_isolated_from_departures() {
    let registry = Arc::new(Registry::new());

    let broadcaster = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut reports = Vec::new();
            for n in 0..200 {
                reports.push(registry.broadcast(&format!("tick {n}")).await);
                tokio::task::yield_now().await;
            }
            reports
        })
    };

    let mut churn = Vec::new();
    for i in 0..CHURNERS {
        let registry = Arc::clone(&registry);
        churn.push(tokio::spawn(async move {
            let (conn, _peer) = MemoryConnection::pair(&format!("c{i}"));
            let guard = registry.join(Arc::new(conn)).await.unwrap();
            tokio::task::yield_now().await;
            guard.release().await
        }));
    }

    for task in churn {
        assert!(task.await.unwrap());
    }
    let reports = broadcaster.await.expect("broadcaster should not panic");

    // A snapshot can outlive a peer that left right after it was taken;
    // such sends fail quietly and are only counted.
    assert_eq!(reports.len(), 200);
    assert!(reports.iter().all(|r| r.attempted <= CHURNERS));
    assert!(reports.iter().all(|r| r.failed <= r.attempted));
    assert!(registry.is_empty().await);
}
