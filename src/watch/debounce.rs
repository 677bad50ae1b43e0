//! Per-path debouncing of raw watch events.
//!
//! Editors rarely write a file in one syscall: a save is often
//! write-then-rename, or several appends in quick succession. Each path
//! gets a cancel-and-restart timer, so only the last event of a burst
//! reaches the sync path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::backend::RawEvent;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Map of path to armed debounce timer. Cloning shares the underlying map.
#[derive(Clone)]
pub struct DebounceMap {
    delay: Duration,
    next_generation: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<PathBuf, Pending>>>,
    settled_tx: UnboundedSender<RawEvent>,
}

impl DebounceMap {
    /// Create a map with the given settle delay. Returns the receiver on
    /// which settled events are delivered.
    pub fn new(delay: Duration) -> (Self, UnboundedReceiver<RawEvent>) {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                next_generation: Arc::new(AtomicU64::new(0)),
                pending: Arc::new(Mutex::new(HashMap::new())),
                settled_tx,
            },
            settled_rx,
        )
    }

    /// Arm (or re-arm) the timer for `event.path`. A later event for the
    /// same path cancels this one, so only the last event of a burst
    /// settles.
    pub fn schedule(&self, event: RawEvent) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let path = event.path.clone();
        let shared = Arc::clone(&self.pending);
        let settled_tx = self.settled_tx.clone();

        // Holding the lock across the spawn means the new task cannot
        // observe the map before its own handle is inserted.
        let mut map = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = shared.lock();
                match map.get(&event.path) {
                    Some(armed) if armed.generation == generation => {
                        map.remove(&event.path);
                    }
                    // Superseded or cancelled while firing: deliver nothing.
                    _ => return,
                }
            }
            let _ = settled_tx.send(event);
        });
        if let Some(previous) = map.insert(path, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel every armed timer. No settled event is delivered for them.
    pub fn cancel_all(&self) {
        let mut map = self.pending.lock();
        for (_, armed) in map.drain() {
            armed.handle.abort();
        }
    }

    /// Number of paths with an armed timer.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::watch::backend::RawEventKind;

    const RECV_DEADLINE: Duration = Duration::from_secs(3);

    fn change(path: &str) -> RawEvent {
        RawEvent {
            path: PathBuf::from(path),
            kind: RawEventKind::Changed,
        }
    }

    #[tokio::test]
    async fn test_single_event_settles() {
        let (debounce, mut rx) = DebounceMap::new(Duration::from_millis(50));
        debounce.schedule(change("/p/a.md"));

        let settled = timeout(RECV_DEADLINE, rx.recv())
            .await
            .expect("event should settle")
            .expect("channel should stay open");
        assert_eq!(settled, change("/p/a.md"));
        assert!(debounce.is_empty());
    }

    #[tokio::test]
    async fn test_burst_settles_once_with_last_event() {
        let (debounce, mut rx) = DebounceMap::new(Duration::from_millis(150));

        for _ in 0..4 {
            debounce.schedule(change("/p/a.md"));
            sleep(Duration::from_millis(10)).await;
        }
        debounce.schedule(RawEvent {
            path: PathBuf::from("/p/a.md"),
            kind: RawEventKind::Removed,
        });

        let settled = timeout(RECV_DEADLINE, rx.recv())
            .await
            .expect("burst should settle")
            .expect("channel should stay open");
        assert_eq!(settled.kind, RawEventKind::Removed, "last event wins");

        let extra = timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(extra.is_err(), "exactly one settled event per burst");
    }

    #[tokio::test]
    async fn test_distinct_paths_settle_independently() {
        let (debounce, mut rx) = DebounceMap::new(Duration::from_millis(50));
        debounce.schedule(change("/p/a.md"));
        debounce.schedule(change("/p/b.md"));
        assert_eq!(debounce.len(), 2);

        let mut settled = Vec::new();
        for _ in 0..2 {
            settled.push(
                timeout(RECV_DEADLINE, rx.recv())
                    .await
                    .expect("both paths should settle")
                    .expect("channel should stay open"),
            );
        }
        settled.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(settled[0].path, PathBuf::from("/p/a.md"));
        assert_eq!(settled[1].path, PathBuf::from("/p/b.md"));
    }

    #[tokio::test]
    async fn test_reschedule_restarts_the_timer() {
        let (debounce, mut rx) = DebounceMap::new(Duration::from_millis(400));
        debounce.schedule(change("/p/a.md"));
        sleep(Duration::from_millis(150)).await;
        debounce.schedule(change("/p/a.md"));
        sleep(Duration::from_millis(150)).await;

        // 300 ms after the first schedule but only 150 ms after the second:
        // the restarted timer must still be armed.
        assert_eq!(debounce.len(), 1, "timer should still be armed");

        let settled = timeout(RECV_DEADLINE, rx.recv())
            .await
            .expect("event should settle eventually")
            .expect("channel should stay open");
        assert_eq!(settled.path, PathBuf::from("/p/a.md"));
    }

    #[tokio::test]
    async fn test_cancel_all_silences_pending() {
        let (debounce, mut rx) = DebounceMap::new(Duration::from_millis(50));
        debounce.schedule(change("/p/a.md"));
        debounce.schedule(change("/p/b.md"));
        debounce.cancel_all();
        assert!(debounce.is_empty());

        let extra = timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(extra.is_err(), "cancelled timers must not settle");
    }
}
