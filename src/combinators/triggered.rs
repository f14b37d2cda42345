//! # Trigger-driven tasks.
//!
//! [`call_when_triggered_with`] parks a supervised task on a trigger channel
//! and runs the user function once per received value, one invocation at a time.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StopWaiterError;
use crate::launcher::ThreadLauncher;

/// Runs `f(scope, value)` for every value received on `trigger`.
///
/// The task exits when the scope is cancelled or `trigger` is closed.
/// Invocations never overlap: the next value is received only after the
/// previous call returned.
#[track_caller]
pub fn call_when_triggered_with<L, T, F, Fut>(
    launcher: &L,
    mut f: F,
    mut trigger: mpsc::Receiver<T>,
) -> Result<(), StopWaiterError>
where
    L: ThreadLauncher,
    T: Send + 'static,
    F: FnMut(CancellationToken, T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    launcher.launch(move |scope| async move {
        loop {
            if scope.is_cancelled() {
                return;
            }
            tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                received = trigger.recv() => match received {
                    Some(value) => f(scope.clone(), value).await,
                    None => {
                        debug!(error = %StopWaiterError::ChannelClosed, "trigger closed; triggered task exiting");
                        return;
                    }
                },
            }
        }
    })
}
