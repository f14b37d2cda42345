//! # Promises: one supervised computation, one eventual result.
//!
//! [`launch_promise`] runs a fallible computation as a supervised task and
//! returns a [`Promise`] that resolves exactly once with its outcome.
//!
//! ```text
//! launch_promise(launcher, f)
//!   ├─ scope unavailable   → Promise::resolved(Err(NotStarted))
//!   ├─ already stopped     → Promise::resolved(Err(Stopped))
//!   └─ inner = scope.child_token()
//!      launcher.launch(task):
//!          result = catch_unwind(f(inner))
//!          resolver.resolve(result | Err(Panicked))
//!          inner.cancel()
//! ```
//!
//! `Promise::cancel` cancels `inner`, so a computation that checks its scope
//! notices the cancellation. If the task is never run (stop raced the launch)
//! the dropped resolver settles the promise with `Err(Stopped)`.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::StopWaiterError;
use crate::launcher::ThreadLauncher;

/// Shared result cell.
struct Slot<T, E> {
    value: OnceLock<Result<T, E>>,
    ready: CancellationToken,
}

impl<T, E> Slot<T, E> {
    fn set(&self, result: Result<T, E>) {
        let fresh = self.value.set(result).is_ok();
        debug_assert!(fresh, "promise resolved twice");
        self.ready.cancel();
    }
}

/// Handle to the eventual result of a supervised computation.
///
/// Cloning shares the same result; every clone observes the same resolution.
pub struct Promise<T, E> {
    slot: Arc<Slot<T, E>>,
    cancel: Option<CancellationToken>,
}

impl<T, E> Promise<T, E> {
    fn pending(cancel: CancellationToken) -> (Self, Resolver<T, E>)
    where
        E: From<StopWaiterError>,
    {
        let slot = Arc::new(Slot {
            value: OnceLock::new(),
            ready: CancellationToken::new(),
        });
        let resolver = Resolver {
            slot: Some(Arc::clone(&slot)),
        };
        let promise = Self {
            slot,
            cancel: Some(cancel),
        };
        (promise, resolver)
    }

    fn resolved(result: Result<T, E>) -> Self {
        let slot = Arc::new(Slot {
            value: OnceLock::new(),
            ready: CancellationToken::new(),
        });
        slot.set(result);
        Self { slot, cancel: None }
    }

    /// Returns `true` once the result is available.
    pub fn is_ready(&self) -> bool {
        self.slot.ready.is_cancelled()
    }

    /// Returns the result if available, without waiting.
    pub fn try_result(&self) -> Option<&Result<T, E>> {
        self.slot.value.get()
    }

    /// Waits for the result.
    pub async fn wait(&self) -> &Result<T, E> {
        loop {
            if let Some(result) = self.slot.value.get() {
                return result;
            }
            self.slot.ready.cancelled().await;
        }
    }

    /// Waits for the result unless `scope` is cancelled first.
    pub async fn wait_or_cancelled(&self, scope: &CancellationToken) -> Option<&Result<T, E>> {
        tokio::select! {
            biased;
            result = self.wait() => Some(result),
            _ = scope.cancelled() => None,
        }
    }

    /// Cancels the scope the computation runs in.
    ///
    /// The computation only stops if it observes its scope. No effect once
    /// the promise is resolved.
    pub fn cancel(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// Write side of a [`Promise`]; settles it with `Stopped` if dropped unused.
struct Resolver<T, E: From<StopWaiterError>> {
    slot: Option<Arc<Slot<T, E>>>,
}

impl<T, E: From<StopWaiterError>> Resolver<T, E> {
    fn resolve(mut self, result: Result<T, E>) {
        if let Some(slot) = self.slot.take() {
            slot.set(result);
        }
    }
}

impl<T, E: From<StopWaiterError>> Drop for Resolver<T, E> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.set(Err(StopWaiterError::Stopped.into()));
        }
    }
}

/// Runs `f` as a supervised task and returns a promise of its result.
///
/// `f` receives a scope derived from the launcher's scope, cancelled when
/// `f` finishes or when [`Promise::cancel`] is called. Launch-time failures
/// (not started, stopped) come back as an already resolved promise; a panic
/// inside `f` resolves it with [`StopWaiterError::Panicked`].
#[track_caller]
pub fn launch_promise<L, T, E, F, Fut>(launcher: &L, f: F) -> Promise<T, E>
where
    L: ThreadLauncher,
    T: Send + Sync + 'static,
    E: From<StopWaiterError> + Send + Sync + 'static,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let scope = match launcher.scope() {
        Ok(scope) => scope,
        Err(err) => return Promise::resolved(Err(err.into())),
    };
    if launcher.stopped() {
        return Promise::resolved(Err(StopWaiterError::Stopped.into()));
    }

    let inner = scope.child_token();
    let (promise, resolver) = Promise::pending(inner.clone());
    let launched = launcher.launch(move |_scope| async move {
        let task_scope = inner.clone();
        let outcome = AssertUnwindSafe(async move { f(task_scope).await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(result) => resolver.resolve(result),
            Err(_panic) => {
                error!("promise computation panicked");
                resolver.resolve(Err(StopWaiterError::Panicked.into()));
            }
        }
        inner.cancel();
    });
    // A launch error drops the task, and with it the resolver, which settles
    // the promise; only a scope error can get here after the checks above.
    if let Err(err) = launched {
        error!(error = %err, "promise launch failed after scope check");
    }
    promise
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::StopWaiter;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Waiter(StopWaiterError),
        Boom,
    }

    impl From<StopWaiterError> for TestError {
        fn from(err: StopWaiterError) -> Self {
            TestError::Waiter(err)
        }
    }

    fn started() -> StopWaiter {
        let sw = StopWaiter::new();
        sw.start(&CancellationToken::new(), "promise").expect("start");
        sw
    }

    #[tokio::test]
    async fn resolves_with_value() -> anyhow::Result<()> {
        let sw = started();
        let p = launch_promise(&sw, |_| async { Ok::<_, TestError>(42u32) });
        assert_eq!(p.wait().await, &Ok(42));
        assert!(p.is_ready());
        let q = p.clone();
        assert_eq!(q.try_result(), Some(&Ok(42)));
        sw.stop_and_wait().await?;
        Ok(())
    }

    #[tokio::test]
    async fn resolves_with_error() {
        let sw = started();
        let p = launch_promise(&sw, |_| async { Err::<u32, _>(TestError::Boom) });
        assert_eq!(p.wait().await, &Err(TestError::Boom));
    }

    #[test]
    fn not_started_is_pre_resolved() {
        let sw = StopWaiter::new();
        let p = launch_promise(&sw, |_| async { Ok::<_, TestError>(()) });
        assert_eq!(
            p.try_result(),
            Some(&Err(TestError::Waiter(StopWaiterError::NotStarted)))
        );
    }

    #[tokio::test]
    async fn stopped_is_pre_resolved_without_launch() {
        let sw = started();
        sw.stop_only();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let p = launch_promise(&sw, move |_| async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, TestError>(())
        });

        assert_eq!(
            p.try_result(),
            Some(&Err(TestError::Waiter(StopWaiterError::Stopped)))
        );
        assert_eq!(sw.live_tasks(), 0);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reaches_computation() -> anyhow::Result<()> {
        let sw = started();
        let p = launch_promise(&sw, |scope| async move {
            tokio::select! {
                _ = scope.cancelled() => Err(TestError::Boom),
                _ = tokio::time::sleep(Duration::from_secs(3600)) => Ok(1u8),
            }
        });
        assert!(!p.is_ready());

        p.cancel();
        assert_eq!(p.wait().await, &Err(TestError::Boom));
        assert!(!sw.scope()?.is_cancelled(), "only the inner scope is cancelled");
        sw.stop_and_wait().await?;
        Ok(())
    }

    #[tokio::test]
    async fn stop_cancels_pending_computation() -> anyhow::Result<()> {
        let sw = started();
        let p = launch_promise(&sw, |scope| async move {
            scope.cancelled().await;
            Err::<(), _>(TestError::Boom)
        });
        sw.stop_and_wait().await?;
        assert_eq!(p.try_result(), Some(&Err(TestError::Boom)));
        Ok(())
    }

    #[tokio::test]
    async fn panic_resolves_with_panicked() {
        let sw = started();
        let p = launch_promise(&sw, |_| async {
            let fail = true;
            if fail {
                panic!("boom");
            }
            Ok::<(), TestError>(())
        });
        assert_eq!(
            p.wait().await,
            &Err(TestError::Waiter(StopWaiterError::Panicked))
        );
    }

    #[tokio::test]
    async fn wait_or_cancelled_gives_up() {
        let sw = started();
        let p = launch_promise(&sw, |scope| async move {
            scope.cancelled().await;
            Ok::<_, TestError>(())
        });
        let give_up = CancellationToken::new();
        give_up.cancel();
        assert!(p.wait_or_cancelled(&give_up).await.is_none());
        assert!(!p.is_ready());
        p.cancel();
    }
}
