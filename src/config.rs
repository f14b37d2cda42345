//! # Stop-waiter configuration.
//!
//! Provides [`Config`], the settings a [`StopWaiter`](crate::StopWaiter) is
//! created with.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the event bus
//! - `warning_timeout = 0s` → the slow-stop warning fires as soon as
//!   `stop_and_wait` finds tasks still running

use std::time::Duration;

/// Default delay before `stop_and_wait` reports a slow shutdown.
pub const DEFAULT_WARNING_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for a [`StopWaiter`](crate::StopWaiter).
///
/// ## Field semantics
/// - `warning_timeout`: how long `stop_and_wait` waits before emitting the
///   slow-stop diagnostic. It never aborts the wait.
/// - `repeat_warnings`: re-emit the diagnostic every further
///   `warning_timeout` while tasks are still running.
/// - `bus_capacity`: lifecycle event ring buffer size (min 1).
#[derive(Clone, Debug)]
pub struct Config {
    /// Diagnostic threshold for a slow shutdown.
    pub warning_timeout: Duration,

    /// Whether the slow-stop diagnostic recurs until drain.
    pub repeat_warnings: bool,

    /// Capacity of the lifecycle event broadcast channel.
    ///
    /// Receivers lagging behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `warning_timeout = 30s`
    /// - `repeat_warnings = true`
    /// - `bus_capacity = 64`
    fn default() -> Self {
        Self {
            warning_timeout: DEFAULT_WARNING_TIMEOUT,
            repeat_warnings: true,
            bus_capacity: 64,
        }
    }
}
