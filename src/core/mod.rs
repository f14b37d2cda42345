//! Lifecycle core: the controller and its bookkeeping.
//!
//! The public API from this module is [`StopWaiter`], its fail-fast wrapper
//! [`StrictStopWaiter`] and the [`DrainSignal`] they hand out.
//!
//! Internal modules:
//! - [`waiter`]: start/stop state, supervised launch, stop-and-wait;
//! - [`strict`]: panicking wrapper for call sites where misuse is a bug;
//! - [`drain`]: one-shot signal fired after cancellation and drain;
//! - [`alive`]: registry of running tasks for slow-stop diagnostics.

mod alive;
mod drain;
mod strict;
mod waiter;

pub use drain::DrainSignal;
pub use strict::StrictStopWaiter;
pub use waiter::StopWaiter;
