//! # StrictStopWaiter: the fail-fast face of [`StopWaiter`].
//!
//! Same operations, but ordering violations (launch before start, start after
//! start, ...) panic at the caller's location instead of returning a
//! [`StopWaiterError`]. Use it where the owner's own logic already guarantees
//! the ordering, so a violation can only be a bug.
//!
//! Read-only accessors (`started`, `stopped`, `live_tasks`, `subscribe`, ...)
//! are reachable through `Deref`.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::drain::DrainSignal;
use super::waiter::StopWaiter;
use crate::config::Config;
use crate::error::StopWaiterError;
use crate::launcher::ThreadLauncher;

/// Unwraps `res`, panicking on a controller misuse.
#[track_caller]
fn fail_fast<T>(op: &'static str, name: &str, res: Result<T, StopWaiterError>) -> T {
    match res {
        Ok(value) => value,
        Err(err) => {
            error!(op, name, error = err.as_label(), "stop-waiter misuse");
            panic!("stop-waiter {name}: {op}: {err}")
        }
    }
}

/// Lifecycle controller whose misuse panics.
#[derive(Debug, Default)]
pub struct StrictStopWaiter {
    inner: StopWaiter,
}

impl StrictStopWaiter {
    /// Creates an unstarted controller with the default [`Config`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unstarted controller with the given configuration.
    pub fn with_config(cfg: Config) -> Self {
        Self {
            inner: StopWaiter::with_config(cfg),
        }
    }

    /// Returns the wrapped fallible controller.
    pub fn inner(&self) -> &StopWaiter {
        &self.inner
    }

    /// Opens the scope; panics if already started.
    #[track_caller]
    pub fn start(&self, parent: &CancellationToken, name: impl Into<Arc<str>>) {
        let name = name.into();
        let res = self.inner.start(parent, Arc::clone(&name));
        fail_fast("start", &name, res)
    }

    /// Requests stop and waits for every supervised task.
    pub async fn stop_and_wait(&self) {
        self.stop_and_wait_timeout(self.inner.config().warning_timeout)
            .await
    }

    /// Like [`stop_and_wait`](Self::stop_and_wait) with an explicit warning threshold.
    pub async fn stop_and_wait_timeout(&self, warning_timeout: Duration) {
        let res = self.inner.stop_and_wait_timeout(warning_timeout).await;
        fail_fast("stop_and_wait", &self.inner.name(), res)
    }

    /// Returns the scope; panics before start.
    #[track_caller]
    pub fn scope(&self) -> CancellationToken {
        fail_fast("scope", &self.inner.name(), self.inner.scope())
    }

    /// Returns the parent scope; panics before start.
    #[track_caller]
    pub fn parent_scope(&self) -> CancellationToken {
        fail_fast("parent_scope", &self.inner.name(), self.inner.parent_scope())
    }

    /// Returns the drain signal; panics before start.
    #[track_caller]
    pub fn wait_handle(&self) -> DrainSignal {
        fail_fast("wait_handle", &self.inner.name(), self.inner.wait_handle())
    }

    /// Launches a supervised task; panics before start, silently skips after stop.
    #[track_caller]
    pub fn launch<F, Fut>(&self, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        fail_fast("launch", &self.inner.name(), self.inner.launch(f))
    }

    /// Runs `f` periodically; panics before start.
    #[track_caller]
    pub fn call_iteratively<F, Fut>(&self, f: F)
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        fail_fast(
            "call_iteratively",
            &self.inner.name(),
            self.inner.call_iteratively(f),
        )
    }
}

impl Deref for StrictStopWaiter {
    type Target = StopWaiter;

    fn deref(&self) -> &StopWaiter {
        &self.inner
    }
}

impl ThreadLauncher for StrictStopWaiter {
    fn scope(&self) -> Result<CancellationToken, StopWaiterError> {
        self.inner.scope()
    }

    #[track_caller]
    fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.launch(f)
    }

    #[track_caller]
    fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.inner.launch_untracked(fut)
    }

    fn stopped(&self) -> bool {
        self.inner.stopped()
    }
}
