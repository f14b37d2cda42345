//! # Self-rescheduling periodic tasks.
//!
//! Both combinators launch one supervised task that calls the user function,
//! takes the returned [`Duration`] as the delay before the next call, and
//! stops at the first loop boundary where the scope is cancelled.
//!
//! ```text
//! loop {
//!   ├─► delay = f(scope, value)          (value: trigger payload or T::default())
//!   ├─► scope cancelled?        → exit
//!   ├─► delay == 0              → call again immediately
//!   └─► select:
//!         scope cancelled       → exit
//!         trigger recv Some(v)  → next call with v   (call_iteratively_with only)
//!         trigger closed        → exit               (call_iteratively_with only)
//!         sleep(delay)          → next call with T::default()
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StopWaiterError;
use crate::launcher::ThreadLauncher;

/// Calls `f` repeatedly in a supervised task.
///
/// `f` returns the delay before its next invocation. A zero delay re-invokes
/// immediately; a positive delay is abandoned as soon as the scope is
/// cancelled, without a further call.
#[track_caller]
pub fn call_iteratively<L, F, Fut>(launcher: &L, mut f: F) -> Result<(), StopWaiterError>
where
    L: ThreadLauncher,
    F: FnMut(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Duration> + Send + 'static,
{
    launcher.launch(move |scope| async move {
        loop {
            let interval = f(scope.clone()).await;
            if scope.is_cancelled() {
                return;
            }
            if interval.is_zero() {
                tokio::task::consume_budget().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                _ = time::sleep(interval) => {}
            }
        }
    })
}

/// Calls `f` repeatedly in a supervised task; values sent on `trigger` wake it early.
///
/// The value passed to `f` is the one received from `trigger`, or
/// `T::default()` when the call was driven by the timer. The pending value is
/// reset after every call. Closing `trigger` while the task waits on it ends the task.
#[track_caller]
pub fn call_iteratively_with<L, T, F, Fut>(
    launcher: &L,
    mut f: F,
    mut trigger: mpsc::Receiver<T>,
) -> Result<(), StopWaiterError>
where
    L: ThreadLauncher,
    T: Default + Send + 'static,
    F: FnMut(CancellationToken, T) -> Fut + Send + 'static,
    Fut: Future<Output = Duration> + Send + 'static,
{
    launcher.launch(move |scope| async move {
        let mut pending = T::default();
        loop {
            let interval = f(scope.clone(), std::mem::take(&mut pending)).await;
            if scope.is_cancelled() {
                return;
            }
            if interval.is_zero() {
                tokio::task::consume_budget().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                received = trigger.recv() => match received {
                    Some(value) => pending = value,
                    None => {
                        debug!(error = %StopWaiterError::ChannelClosed, "trigger closed; iterative task exiting");
                        return;
                    }
                },
                _ = time::sleep(interval) => {}
            }
        }
    })
}
