//! Error types returned by the stop-waiter and its combinators.
//!
//! [`StopWaiterError`] covers every recoverable condition raised by
//! [`StopWaiter`](crate::StopWaiter): ordering violations (`NotStarted`,
//! `AlreadyStarted`), operations that require a live scope (`Stopped`),
//! and the failure modes of supervised computations (`ChannelClosed`,
//! `Panicked`).
//!
//! The strict wrapper ([`StrictStopWaiter`](crate::StrictStopWaiter)) turns
//! each of these into a panic instead of returning them.

use thiserror::Error;

/// # Errors produced by the lifecycle controller.
///
/// Use [`as_label`](StopWaiterError::as_label) when a short stable string is
/// needed for logs or metrics.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWaiterError {
    /// A scope-dependent operation was invoked before `start`.
    #[error("not started")]
    NotStarted,

    /// `start` was invoked a second time.
    #[error("start after start")]
    AlreadyStarted,

    /// The operation needs an active scope but stop was already requested.
    #[error("stopped")]
    Stopped,

    /// A channel the task was waiting on has been closed.
    #[error("channel closed")]
    ChannelClosed,

    /// A supervised computation panicked before producing its result.
    #[error("supervised computation panicked")]
    Panicked,
}

impl StopWaiterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stopwait::StopWaiterError;
    ///
    /// assert_eq!(StopWaiterError::NotStarted.as_label(), "not_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StopWaiterError::NotStarted => "not_started",
            StopWaiterError::AlreadyStarted => "already_started",
            StopWaiterError::Stopped => "stopped",
            StopWaiterError::ChannelClosed => "channel_closed",
            StopWaiterError::Panicked => "panicked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_labels() {
        assert_eq!(StopWaiterError::AlreadyStarted.to_string(), "start after start");
        assert_eq!(StopWaiterError::AlreadyStarted.as_label(), "already_started");
        assert_eq!(StopWaiterError::Stopped.to_string(), "stopped");
        assert_eq!(StopWaiterError::Panicked.as_label(), "panicked");
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = StopWaiterError::NotStarted.into();
        assert_eq!(err.to_string(), "not started");
    }
}
