//! # stopwait
//!
//! **stopwait** is a structured-concurrency lifecycle controller for tokio.
//!
//! A [`StopWaiter`] owns one cancellable scope, supervises every task launched
//! inside it, and guarantees that "stop" means every supervised task has
//! actually finished, not merely that cancellation was requested.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        owner ──► start(parent, name)
//!          │
//!          │  launch(f) / call_iteratively(f) / combinators
//!          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StopWaiter                                                       │
//! │  - Mutex<State> (stopped, name, parent scope, scope, drain)       │
//! │  - TaskTracker  (counts supervised tasks)                         │
//! │  - AliveTracker (launch site + age of each running task)          │
//! │  - Bus          (lifecycle events)                                │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ task #1  │       │ task #2  │       │ task #N  │   each gets `scope`
//!   └──────────┘       └──────────┘       └──────────┘   and polls it
//!
//!  stop_and_wait():
//!    stop_only() ──► scope.cancel()
//!    DrainSignal ◄── watcher: scope cancelled && tracker empty
//!    every warning_timeout before drain ──► warn! + running-task snapshot
//! ```
//!
//! ### Lifecycle
//! ```text
//! new ──► start ──► (launch | combinators)* ──► stop_only ──► stop_and_wait ──► drained
//!  │                                              ▲
//!  └──────────── stop_only before start ──────────┘  (next start cancels at once)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / functions                          |
//! |-------------------|---------------------------------------------------------------|------------------------------------------------|
//! | **Lifecycle**     | Start once, stop idempotently, wait for drain.                | [`StopWaiter`], [`DrainSignal`]                |
//! | **Fail-fast**     | Panic on ordering violations instead of returning errors.     | [`StrictStopWaiter`]                           |
//! | **Capability**    | Narrow launch surface the combinators are written against.    | [`ThreadLauncher`]                             |
//! | **Combinators**   | Periodic, trigger-driven and rate-limited supervised tasks.   | [`call_iteratively_with`], [`chan_rate_limiter`] |
//! | **Promises**      | One supervised computation, one eventual result.              | [`launch_promise`], [`Promise`]                |
//! | **Events**        | Observe start, stop, slow-stop and drain.                     | [`Event`], [`EventKind`]                       |
//! | **Errors**        | Typed, recoverable lifecycle errors.                          | [`StopWaiterError`]                            |
//! | **Configuration** | Slow-stop threshold and event bus sizing.                     | [`Config`]                                     |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//! use stopwait::{StopWaiter, StopWaiterError, call_iteratively_with, launch_promise};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StopWaiterError> {
//!     let sw = StopWaiter::new();
//!     sw.start(&CancellationToken::new(), "example")?;
//!
//!     // Poll every second, or right away when something is sent on `poke`.
//!     let (poke, rx) = mpsc::channel::<bool>(1);
//!     call_iteratively_with(&sw, |_scope, forced: bool| async move {
//!         if forced { /* refresh now */ }
//!         Duration::from_secs(1)
//!     }, rx)?;
//!     let _ = poke.send(true).await;
//!
//!     let answer = launch_promise(&sw, |_scope| async { Ok::<_, StopWaiterError>(42) });
//!     assert_eq!(answer.wait().await, &Ok(42));
//!
//!     sw.stop_and_wait().await?;
//!     Ok(())
//! }
//! ```
mod combinators;
mod config;
mod core;
mod error;
mod events;
mod launcher;
mod promise;

// ---- Public re-exports ----

pub use combinators::{
    call_iteratively, call_iteratively_with, call_when_triggered_with, chan_rate_limiter,
};
pub use config::{Config, DEFAULT_WARNING_TIMEOUT};
pub use crate::core::{DrainSignal, StopWaiter, StrictStopWaiter};
pub use error::StopWaiterError;
pub use events::{Event, EventKind};
pub use launcher::ThreadLauncher;
pub use promise::{Promise, launch_promise};
