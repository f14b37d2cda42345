//! # Lifecycle events emitted by a stop-waiter.
//!
//! The [`EventKind`] enum classifies the transitions of one controller:
//! start, stop request, slow-stop diagnostics and final drain.
//!
//! The [`Event`] struct carries the metadata: timestamp, controller name,
//! the number of supervised tasks still running, delays and a free-form reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stopwait::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StopDelayed)
//!     .with_name("indexer")
//!     .with_delay(Duration::from_secs(30))
//!     .with_live(2);
//!
//! assert_eq!(ev.kind, EventKind::StopDelayed);
//! assert_eq!(ev.name.as_deref(), Some("indexer"));
//! assert_eq!(ev.live, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The controller opened its scope.
    ///
    /// Sets:
    /// - `name`: controller name
    /// - `reason`: `"stopped_before_start"` when the scope was cancelled immediately
    Started,

    /// Stop was requested and the scope cancelled (first request only).
    ///
    /// Sets:
    /// - `name`: controller name
    /// - `live`: supervised tasks still running at the time of the request
    StopRequested,

    /// `stop_and_wait` exceeded its warning timeout.
    ///
    /// Sets:
    /// - `name`: controller name
    /// - `delay_ms`: time waited so far (ms)
    /// - `live`: supervised tasks still running
    /// - `reason`: snapshot of the running tasks' launch sites
    StopDelayed,

    /// The scope is cancelled and every supervised task has exited.
    ///
    /// Sets:
    /// - `name`: controller name
    Drained,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Diagnostic name of the emitting controller.
    pub name: Option<Arc<str>>,
    /// Elapsed delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Number of supervised tasks still running.
    pub live: Option<usize>,
    /// Human-readable details.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            delay_ms: None,
            live: None,
            reason: None,
        }
    }

    /// Attaches the controller name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the number of running supervised tasks.
    #[inline]
    pub fn with_live(mut self, n: usize) -> Self {
        self.live = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
