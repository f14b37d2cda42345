//! # Launcher capability.
//!
//! [`ThreadLauncher`] is the narrow surface the combinators need from a
//! controller: the scope, supervised and untracked launch, and the stopped
//! flag. [`StopWaiter`](crate::StopWaiter) and
//! [`StrictStopWaiter`](crate::StrictStopWaiter) implement it; tests may use
//! a fake.
//!
//! ## Example
//! ```rust
//! use tokio::sync::mpsc;
//! use stopwait::{ThreadLauncher, call_when_triggered_with};
//!
//! fn wire<L: ThreadLauncher>(launcher: &L, rx: mpsc::Receiver<u32>) {
//!     let _ = call_when_triggered_with(launcher, |_scope, n: u32| async move {
//!         println!("got {n}");
//!     }, rx);
//! }
//! ```

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::StopWaiterError;

/// Capability to launch work inside a cancellable scope.
///
/// Implementors must uphold the controller contract:
/// - `scope` fails with [`StopWaiterError::NotStarted`] before start;
/// - `launch` fails the same way before start and silently skips `f` once stopped;
/// - every launched task is waited for by the implementor's stop.
pub trait ThreadLauncher {
    /// Returns the active scope.
    fn scope(&self) -> Result<CancellationToken, StopWaiterError>;

    /// Launches `f` as a supervised task with the scope as its argument.
    fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    /// Spawns `fut` with no scope and no accounting.
    fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static;

    /// Returns `true` once stop was requested.
    fn stopped(&self) -> bool;
}

impl<L: ThreadLauncher> ThreadLauncher for &L {
    fn scope(&self) -> Result<CancellationToken, StopWaiterError> {
        (**self).scope()
    }

    #[track_caller]
    fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        (**self).launch(f)
    }

    #[track_caller]
    fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        (**self).launch_untracked(fut)
    }

    fn stopped(&self) -> bool {
        (**self).stopped()
    }
}

impl<L: ThreadLauncher> ThreadLauncher for std::sync::Arc<L> {
    fn scope(&self) -> Result<CancellationToken, StopWaiterError> {
        (**self).scope()
    }

    #[track_caller]
    fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        (**self).launch(f)
    }

    #[track_caller]
    fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        (**self).launch_untracked(fut)
    }

    fn stopped(&self) -> bool {
        (**self).stopped()
    }
}
