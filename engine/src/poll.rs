use rollcall_primitives::{SessionSnapshot, SessionStore};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background reader of the shared store.
///
/// Observers see a change at most one `interval` after it was written; that
/// interval is the staleness window. Dropping the poller stops the task.
pub struct SnapshotPoller {
    rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
    interval: Duration,
}

impl SnapshotPoller {
    pub fn latest(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.rx.clone()
    }

    pub fn staleness_window(&self) -> Duration {
        self.interval
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for SnapshotPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read `snapshot()` immediately and then every `interval`, publishing only
/// snapshots that differ from the last one. Read errors are logged and the
/// previous value is kept.
pub fn spawn_snapshot_poller<S>(store: S, interval: Duration) -> SnapshotPoller
where
    S: SessionStore + 'static,
{
    let (tx, rx) = watch::channel(SessionSnapshot::default());

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match store.snapshot().await {
                Ok(snapshot) => {
                    tx.send_if_modified(|current| {
                        if *current == snapshot {
                            return false;
                        }
                        log::debug!(
                            "Session snapshot changed: version {} -> {}",
                            current.version,
                            snapshot.version
                        );
                        *current = snapshot;
                        true
                    });
                }
                Err(e) => log::warn!("Session poll failed: {}", e),
            }

            if tx.is_closed() {
                break;
            }
        }
    });

    SnapshotPoller { rx, task, interval }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_primitives::Coordinate;
    use rollcall_store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_poller_observes_start_and_end() {
        let store = MemoryStore::new();
        let mut poller = spawn_snapshot_poller(store.clone(), Duration::from_secs(5));

        store.start_session(Coordinate::exact(40.0, -75.0)).await.unwrap();
        let seen = poller.changed().await.unwrap();
        assert!(seen.state.active);

        store.end_session().await.unwrap();
        let seen = poller.changed().await.unwrap();
        assert!(!seen.state.active);
        assert!(seen.state.reference.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_bounded_by_interval() {
        let store = MemoryStore::new();
        let interval = Duration::from_secs(3);
        let mut poller = spawn_snapshot_poller(store.clone(), interval);
        assert_eq!(poller.staleness_window(), interval);

        // Let the immediate first read happen.
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.start_session(Coordinate::exact(0.0, 0.0)).await.unwrap();
        let written = tokio::time::Instant::now();

        poller.changed().await.unwrap();
        assert!(written.elapsed() <= interval);
        assert!(poller.latest().state.active);
    }
}
