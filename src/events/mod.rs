//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StopWaiter::start`, `StopWaiter::stop_only`,
//!   `stop_and_wait` (slow-stop diagnostics) and the drain watcher.
//! - **Consumers**: anything holding a receiver from `StopWaiter::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
