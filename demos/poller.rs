//! # Poller Example
//!
//! Shows a typical owner of a [`StopWaiter`]:
//! - a periodic poller that can be woken early through a trigger channel
//! - a worker that handles each trigger value in turn
//! - a promise computed once in the background
//! - a slow task that makes shutdown emit the slow-stop diagnostic
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example poller
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use stopwait::{
    Config, StopWaiter, StopWaiterError, call_iteratively_with, call_when_triggered_with,
    launch_promise,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let sw = StopWaiter::with_config(Config {
        warning_timeout: Duration::from_millis(200),
        ..Config::default()
    });
    let mut events = sw.subscribe();
    let root = CancellationToken::new();
    sw.start(&root, "poller-demo")?;

    let polled = Arc::new(AtomicU64::new(0));
    let (poke_tx, poke_rx) = mpsc::channel::<bool>(4);
    let counter = Arc::clone(&polled);
    call_iteratively_with(
        &sw,
        move |_scope, forced: bool| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            async move {
                println!("{:>6}[poll #{n}] forced={forced}", "");
                Duration::from_millis(300)
            }
        },
        poke_rx,
    )?;

    let (job_tx, job_rx) = mpsc::channel::<u32>(4);
    call_when_triggered_with(
        &sw,
        |_scope, job: u32| async move {
            println!("{:>6}[job {job}] handled", "");
        },
        job_rx,
    )?;

    let answer = launch_promise(&sw, |scope| async move {
        tokio::select! {
            _ = scope.cancelled() => Err(StopWaiterError::Stopped),
            _ = tokio::time::sleep(Duration::from_millis(100)) => Ok(42u64),
        }
    });

    sw.launch(|_scope| async move {
        // ignores cancellation for a while
        tokio::time::sleep(Duration::from_millis(700)).await;
        println!("{:>6}[slow] finally done", "");
    })?;

    for job in 1..=3 {
        job_tx.send(job).await?;
    }
    poke_tx.send(true).await?;
    println!("answer = {:?}", answer.wait().await);

    tokio::time::sleep(Duration::from_millis(500)).await;
    sw.stop_and_wait().await?;
    println!("polled {} times", polled.load(Ordering::Relaxed));

    while let Ok(ev) = events.try_recv() {
        println!("event #{} {:?} live={:?}", ev.seq, ev.kind, ev.live);
    }
    Ok(())
}
