//! # Rate-limited forwarding between channels.
//!
//! [`chan_rate_limiter`] relays values from an input channel to a new output
//! channel, forwarding at most one value per interval. Values arriving while
//! the interval is still running are dropped, never queued.
//!
//! ```text
//! input ──► [supervised task] ──► output (capacity 1)
//!              │
//!              ├─ now >= next_allowed → forward, next_allowed = now + rate()
//!              └─ now <  next_allowed → drop
//! ```
//!
//! The output channel closes when the scope is cancelled or the input closes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::StopWaiterError;
use crate::launcher::ThreadLauncher;

/// Forwards values from `input` no faster than `rate()` allows.
///
/// `rate` is consulted after every forwarded value, so the interval may
/// change at runtime. If the task cannot be launched the error is returned
/// and the output channel is dropped closed. If the controller is already
/// stopped the returned receiver is closed and yields nothing.
#[track_caller]
pub fn chan_rate_limiter<L, T, F>(
    launcher: &L,
    mut input: mpsc::Receiver<T>,
    mut rate: F,
) -> Result<mpsc::Receiver<T>, StopWaiterError>
where
    L: ThreadLauncher,
    T: Send + 'static,
    F: FnMut() -> Duration + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    launcher.launch(move |scope| async move {
        let mut next_allowed = Instant::now();
        loop {
            let data = tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                received = input.recv() => match received {
                    Some(data) => data,
                    None => return,
                },
            };

            let now = Instant::now();
            if now < next_allowed {
                continue;
            }
            tokio::select! {
                biased;
                _ = scope.cancelled() => return,
                sent = tx.send(data) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
            next_allowed = now + rate();
        }
    })?;
    Ok(rx)
}
