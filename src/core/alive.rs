//! # Registry of supervised tasks that are still running.
//!
//! Every supervised launch registers the caller's source location and the
//! launch instant, and receives an [`AliveGuard`]. The guard travels inside the
//! spawned future, so the entry disappears when the task returns, panics or
//! is dropped by the runtime.
//!
//! ## Architecture
//! ```text
//! StopWaiter::launch() ──► AliveTracker::register(location) ──► AliveGuard
//!                                                                   │
//!                                          moved into the task ◄────┘
//!                                                                   │
//!                                      task exits ──► Drop ──► entry removed
//!
//! stop_and_wait() timeout ──► AliveTracker::snapshot() ──► warn!
//! ```

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Launch record of one running task.
#[derive(Debug, Clone, Copy)]
struct TaskState {
    /// Where the task was launched from.
    location: &'static Location<'static>,
    /// When the task was launched.
    since: Instant,
}

/// Thread-safe tracker of running supervised tasks.
#[derive(Debug, Default)]
pub(crate) struct AliveTracker {
    next_id: AtomicU64,
    state: Mutex<HashMap<u64, TaskState>>,
}

impl AliveTracker {
    /// Creates a new empty tracker.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a launch and returns the guard that removes it again.
    pub(crate) fn register(
        self: &Arc<Self>,
        location: &'static Location<'static>,
    ) -> AliveGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            TaskState {
                location,
                since: Instant::now(),
            },
        );
        AliveGuard {
            id,
            tracker: Arc::clone(self),
        }
    }

    /// Number of tasks currently registered.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns one line per running task, oldest first.
    ///
    /// ```text
    /// task #3 launched at src/indexer.rs:42:9, running for 31.2s
    /// ```
    pub(crate) fn snapshot(&self) -> Vec<String> {
        let now = Instant::now();
        let mut tasks: Vec<(u64, TaskState)> =
            self.lock().iter().map(|(id, ts)| (*id, *ts)).collect();
        tasks.sort_unstable_by_key(|(id, ts)| (ts.since, *id));
        tasks
            .into_iter()
            .map(|(id, ts)| {
                let age: Duration = now.saturating_duration_since(ts.since);
                format!(
                    "task #{id} launched at {}, running for {:.1}s",
                    ts.location,
                    age.as_secs_f64()
                )
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, TaskState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its task from the [`AliveTracker`] when dropped.
#[derive(Debug)]
pub(crate) struct AliveGuard {
    id: u64,
    tracker: Arc<AliveTracker>,
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.tracker.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_drop_unregisters() {
        let tracker = AliveTracker::new();
        let a = tracker.register(Location::caller());
        let b = tracker.register(Location::caller());
        assert_eq!(tracker.len(), 2);

        drop(a);
        assert_eq!(tracker.len(), 1);
        drop(b);
        assert_eq!(tracker.len(), 0);
        assert!(tracker.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_lists_oldest_first() {
        let tracker = AliveTracker::new();
        let _first = tracker.register(Location::caller());
        tokio::time::advance(Duration::from_secs(5)).await;
        let _second = tracker.register(Location::caller());

        let snap = tracker.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap[0].starts_with("task #0 launched at src/core/alive.rs"));
        assert!(snap[0].ends_with("running for 5.0s"));
        assert!(snap[1].starts_with("task #1 "));
    }
}
