//! Task-scheduling combinators built on [`ThreadLauncher`](crate::ThreadLauncher).
//!
//! ## Contents
//! - [`call_iteratively`] periodic task whose function returns its next delay
//! - [`call_iteratively_with`] the same, woken early by a trigger channel
//! - [`call_when_triggered_with`] runs once per value received on a trigger channel
//! - [`chan_rate_limiter`] forwards between channels, dropping values that arrive too fast
//!
//! All of them launch exactly one supervised task, so `stop_and_wait` waits for them.

mod iterative;
mod rate_limit;
mod triggered;

pub use iterative::{call_iteratively, call_iteratively_with};
pub use rate_limit::chan_rate_limiter;
pub use triggered::call_when_triggered_with;
