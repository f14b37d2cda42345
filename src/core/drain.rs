//! # Drain signal: fires once the scope is cancelled and all supervised tasks exited.
//!
//! ```text
//! StopWaiter::wait_handle() (first call)
//!     └─► spawn watcher:
//!            scope.cancelled().await
//!            tracker.close(); tracker.wait().await
//!            done.cancel()              ──► DrainSignal::fired() == true
//! ```
//!
//! Firing is one-way. Waiting on an already fired signal returns immediately,
//! any number of times, from any number of clones.

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::events::{Bus, Event, EventKind};

/// Cloneable handle to the one-shot drain event of a [`StopWaiter`](crate::StopWaiter).
#[derive(Clone, Debug)]
pub struct DrainSignal {
    done: CancellationToken,
}

impl DrainSignal {
    /// Returns `true` once the scope is cancelled and every supervised task has exited.
    pub fn fired(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Waits until the signal fires.
    pub async fn wait(&self) {
        self.done.cancelled().await
    }
}

/// Spawns the watcher that fires the returned signal after drain.
///
/// The watcher itself is untracked: it must not count towards the tasks it waits for.
pub(crate) fn spawn_watcher(
    name: std::sync::Arc<str>,
    scope: CancellationToken,
    tracker: TaskTracker,
    bus: Bus,
) -> DrainSignal {
    let done = CancellationToken::new();
    let signal = DrainSignal { done: done.clone() };

    tokio::spawn(async move {
        scope.cancelled().await;
        tracker.close();
        tracker.wait().await;
        debug!(name = %name, "all supervised tasks stopped");
        bus.publish(Event::new(EventKind::Drained).with_name(name));
        done.cancel();
    });

    signal
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_cancel_and_empty() {
        let scope = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(tokio::time::sleep(Duration::from_millis(20)));

        let signal = spawn_watcher("t".into(), scope.clone(), tracker.clone(), Bus::new(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!signal.fired(), "scope not cancelled yet");

        tracker.spawn(tokio::time::sleep(Duration::from_millis(20)));
        scope.cancel();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!signal.fired(), "task still running");

        signal.wait().await;
        assert!(signal.fired());
        assert!(tracker.is_empty());
        // waiting again returns immediately
        signal.clone().wait().await;
    }
}
