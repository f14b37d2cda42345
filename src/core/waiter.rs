//! # StopWaiter: one cancellable scope, many supervised tasks, a stop that waits.
//!
//! The [`StopWaiter`] owns a scope derived from the parent passed to
//! [`start`](StopWaiter::start). Every supervised task receives that scope and
//! is counted by a [`TaskTracker`]; [`stop_and_wait`](StopWaiter::stop_and_wait)
//! cancels the scope and returns only once the count has dropped to zero.
//!
//! ## Lifecycle
//! ```text
//! new() ──► start(parent, name) ──► launch()* / call_iteratively()* / combinators
//!   │             │                                   │
//!   │             └─ scope = parent.child_token()     └─ tracker.spawn(f(scope))
//!   │                (cancelled at once if stop came first)
//!   ▼
//! stop_only()            : scope.cancel(), stopped = true (idempotent, legal before start)
//! stop_and_wait()        : stop_only() + wait for DrainSignal
//!                            ├─ drain before warning_timeout → Ok
//!                            └─ timeout → warn! + live snapshot, keep waiting
//! ```
//!
//! ## Rules
//! - `start` succeeds at most once; a second call fails with `AlreadyStarted`.
//! - Every scope-dependent operation fails with `NotStarted` before `start`.
//! - `launch` after stop silently does nothing and returns `Ok(())`.
//! - State transitions are serialized by one mutex; launch checks `stopped`
//!   and spawns under that same lock, so nothing is spawned after stop.

use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use super::alive::AliveTracker;
use super::drain::{self, DrainSignal};
use crate::combinators;
use crate::config::Config;
use crate::error::StopWaiterError;
use crate::events::{Bus, Event, EventKind};
use crate::launcher::ThreadLauncher;

/// Name reported before `start` supplied one.
const UNNAMED: &str = "unnamed";

/// Mutable lifecycle state, guarded by [`StopWaiter::state`].
#[derive(Debug)]
struct State {
    stopped: bool,
    name: Arc<str>,
    /// Scope passed to `start`; never cancelled by us.
    parent: Option<CancellationToken>,
    /// Our own scope; `Some` exactly when started.
    scope: Option<CancellationToken>,
    /// Lazily created on the first `wait_handle` call.
    drain: Option<DrainSignal>,
}

impl State {
    fn scope(&self) -> Result<&CancellationToken, StopWaiterError> {
        self.scope.as_ref().ok_or(StopWaiterError::NotStarted)
    }

    fn parent(&self) -> Result<&CancellationToken, StopWaiterError> {
        self.parent.as_ref().ok_or(StopWaiterError::NotStarted)
    }
}

/// Structured-concurrency lifecycle controller.
///
/// Holds a single cancellable scope and supervises every task launched in it.
/// See the [module docs](self) for the lifecycle.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use stopwait::StopWaiter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), stopwait::StopWaiterError> {
/// let sw = StopWaiter::new();
/// sw.start(&CancellationToken::new(), "example")?;
///
/// sw.launch(|scope: CancellationToken| async move {
///     scope.cancelled().await;
/// })?;
/// sw.call_iteratively(|_scope| async { Duration::from_millis(10) })?;
///
/// sw.stop_and_wait().await?;
/// assert_eq!(sw.live_tasks(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StopWaiter {
    cfg: Config,
    state: Mutex<State>,
    tracker: TaskTracker,
    alive: Arc<AliveTracker>,
    bus: Bus,
}

impl Default for StopWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl StopWaiter {
    /// Creates an unstarted controller with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an unstarted controller with the given configuration.
    pub fn with_config(cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            state: Mutex::new(State {
                stopped: false,
                name: Arc::from(UNNAMED),
                parent: None,
                scope: None,
                drain: None,
            }),
            tracker: TaskTracker::new(),
            alive: AliveTracker::new(),
            bus,
        }
    }

    /// Returns the configuration this controller was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Opens the scope as a child of `parent`.
    ///
    /// `name` labels this controller in diagnostics. If stop was already
    /// requested, the new scope is cancelled before this returns, so tasks
    /// launched afterwards observe cancellation on their first check.
    ///
    /// Fails with [`StopWaiterError::AlreadyStarted`] on a second call; the
    /// first call's scope and name are kept.
    pub fn start(
        &self,
        parent: &CancellationToken,
        name: impl Into<Arc<str>>,
    ) -> Result<(), StopWaiterError> {
        let mut state = self.lock();
        if state.scope.is_some() {
            return Err(StopWaiterError::AlreadyStarted);
        }

        let scope = parent.child_token();
        state.name = name.into();
        state.parent = Some(parent.clone());
        if state.stopped {
            scope.cancel();
        }
        state.scope = Some(scope);

        debug!(name = %state.name, stopped = state.stopped, "stop-waiter started");
        let mut ev = Event::new(EventKind::Started).with_name(Arc::clone(&state.name));
        if state.stopped {
            ev = ev.with_reason("stopped_before_start");
        }
        self.bus.publish(ev);
        Ok(())
    }

    /// Returns `true` once [`start`](Self::start) has succeeded.
    pub fn started(&self) -> bool {
        self.lock().scope.is_some()
    }

    /// Returns `true` once stop has been requested (before or after start).
    pub fn stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Diagnostic name given to [`start`](Self::start).
    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.lock().name)
    }

    /// Returns the controller's scope.
    pub fn scope(&self) -> Result<CancellationToken, StopWaiterError> {
        self.lock().scope().cloned()
    }

    /// Returns the scope passed to [`start`](Self::start).
    ///
    /// It is not cancelled by [`stop_only`](Self::stop_only), which lets a task
    /// tell "my owner asked me to stop" apart from "my owner is gone".
    pub fn parent_scope(&self) -> Result<CancellationToken, StopWaiterError> {
        self.lock().parent().cloned()
    }

    /// Number of supervised tasks currently running.
    pub fn live_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Subscribes to this controller's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Requests stop without waiting.
    ///
    /// Cancels the scope the first time it is called after start. Always marks
    /// the controller as stopped, also before start.
    pub fn stop_only(&self) {
        let mut state = self.lock();
        if !state.stopped {
            if let Some(scope) = &state.scope {
                scope.cancel();
                let live = self.tracker.len();
                debug!(name = %state.name, live, "stop requested");
                self.bus.publish(
                    Event::new(EventKind::StopRequested)
                        .with_name(Arc::clone(&state.name))
                        .with_live(live),
                );
            }
        }
        state.stopped = true;
    }

    /// Requests stop and waits until every supervised task has exited.
    ///
    /// Uses [`Config::warning_timeout`] as the slow-stop diagnostic threshold.
    pub async fn stop_and_wait(&self) -> Result<(), StopWaiterError> {
        self.stop_and_wait_timeout(self.cfg.warning_timeout).await
    }

    /// Like [`stop_and_wait`](Self::stop_and_wait) with an explicit warning threshold.
    ///
    /// Returns immediately if the controller was never started. Otherwise it
    /// waits for the drain signal; every `warning_timeout` spent waiting emits
    /// a warning with a snapshot of the tasks still running. The threshold
    /// never aborts the wait. Safe to call repeatedly and concurrently.
    pub async fn stop_and_wait_timeout(
        &self,
        warning_timeout: Duration,
    ) -> Result<(), StopWaiterError> {
        self.stop_only();
        if !self.started() {
            return Ok(());
        }
        let drain = self.wait_handle()?;
        self.wait_drained(&drain, warning_timeout).await;
        Ok(())
    }

    /// Returns the drain signal, creating its watcher on first use.
    ///
    /// The signal fires once the scope is cancelled and no supervised task is
    /// running. Fails with [`StopWaiterError::NotStarted`] before start.
    pub fn wait_handle(&self) -> Result<DrainSignal, StopWaiterError> {
        let mut state = self.lock();
        if let Some(drain) = &state.drain {
            return Ok(drain.clone());
        }
        let scope = state.scope()?.clone();
        let drain = drain::spawn_watcher(
            Arc::clone(&state.name),
            scope,
            self.tracker.clone(),
            self.bus.clone(),
        );
        state.drain = Some(drain.clone());
        Ok(drain)
    }

    /// Launches `f` as a supervised task with the controller's scope.
    ///
    /// Fails with [`StopWaiterError::NotStarted`] before start. After stop it
    /// returns `Ok(())` without running `f`.
    #[track_caller]
    pub fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let location = Location::caller();
        let state = self.lock();
        let scope = state.scope()?.clone();
        if state.stopped {
            trace!(name = %state.name, %location, "stopped; not launching");
            return Ok(());
        }

        let guard = self.alive.register(location);
        self.tracker.spawn(async move {
            let _guard = guard;
            f(scope).await
        });
        Ok(())
    }

    /// Spawns `fut` outside supervision: no scope, no accounting.
    ///
    /// `stop_and_wait` never waits for it and it keeps running after stop.
    #[track_caller]
    pub fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        tokio::spawn(fut)
    }

    /// Runs `f` repeatedly in a supervised task; `f` returns the delay before
    /// its next call.
    ///
    /// See [`call_iteratively`](crate::call_iteratively) for the loop semantics.
    #[track_caller]
    pub fn call_iteratively<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        combinators::call_iteratively(self, f)
    }

    /// Waits for drain, reporting every `warning_timeout`. Returns the number
    /// of warnings emitted.
    async fn wait_drained(&self, drain: &DrainSignal, warning_timeout: Duration) -> u32 {
        // Tasks launched after a parent-driven drain are still tracked; the
        // tracker is closed by then, so `wait` covers them too.
        let done = async {
            drain.wait().await;
            self.tracker.wait().await;
        };
        tokio::pin!(done);

        let begin = Instant::now();
        let mut warnings = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut done => return warnings,
                _ = time::sleep(warning_timeout) => {}
            }
            warnings += 1;
            self.report_slow_stop(begin.elapsed());

            if !self.cfg.repeat_warnings || warning_timeout.is_zero() {
                (&mut done).await;
                return warnings;
            }
        }
    }

    fn report_slow_stop(&self, waited: Duration) {
        let name = self.name();
        let live = self.tracker.len();
        let snapshot = self.alive.snapshot().join("\n");

        warn!(
            name = %name,
            delay_secs = waited.as_secs_f64(),
            live,
            "taking too long to stop"
        );
        warn!(name = %name, "still running:\n{snapshot}");

        self.bus.publish(
            Event::new(EventKind::StopDelayed)
                .with_name(name)
                .with_delay(waited)
                .with_live(live)
                .with_reason(snapshot),
        );
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ThreadLauncher for StopWaiter {
    fn scope(&self) -> Result<CancellationToken, StopWaiterError> {
        StopWaiter::scope(self)
    }

    #[track_caller]
    fn launch<F, Fut>(&self, f: F) -> Result<(), StopWaiterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        StopWaiter::launch(self, f)
    }

    #[track_caller]
    fn launch_untracked<Fut>(&self, fut: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        StopWaiter::launch_untracked(self, fut)
    }

    fn stopped(&self) -> bool {
        StopWaiter::stopped(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    fn started(name: &str) -> StopWaiter {
        let sw = StopWaiter::new();
        sw.start(&CancellationToken::new(), name).expect("start");
        sw
    }

    #[test]
    fn operations_before_start_fail() {
        let sw = StopWaiter::new();
        assert!(!sw.started());
        assert_eq!(sw.scope().unwrap_err(), StopWaiterError::NotStarted);
        assert_eq!(sw.parent_scope().unwrap_err(), StopWaiterError::NotStarted);
        assert_eq!(sw.wait_handle().unwrap_err(), StopWaiterError::NotStarted);
        assert_eq!(
            sw.launch(|_| async {}).unwrap_err(),
            StopWaiterError::NotStarted
        );
        assert_eq!(
            sw.call_iteratively(|_| async { Duration::ZERO }).unwrap_err(),
            StopWaiterError::NotStarted
        );
    }

    #[test]
    fn start_twice_keeps_first() {
        let parent = CancellationToken::new();
        let sw = StopWaiter::new();
        sw.start(&parent, "first").expect("start");
        let scope = sw.scope().expect("scope");

        let other = CancellationToken::new();
        assert_eq!(
            sw.start(&other, "second").unwrap_err(),
            StopWaiterError::AlreadyStarted
        );
        assert_eq!(&*sw.name(), "first");

        other.cancel();
        assert!(!scope.is_cancelled());
        parent.cancel();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn stop_before_start_cancels_on_start() {
        let sw = StopWaiter::new();
        sw.stop_only();
        assert!(sw.stopped());
        assert!(!sw.started());

        let parent = CancellationToken::new();
        sw.start(&parent, "late").expect("start after stop is allowed");
        assert!(sw.scope().expect("scope").is_cancelled());
        assert!(!sw.parent_scope().expect("parent").is_cancelled());
    }

    #[test]
    fn stop_only_is_idempotent_and_spares_parent() {
        let sw = started("idem");
        let mut rx = sw.subscribe();
        sw.stop_only();
        sw.stop_only();

        assert!(sw.scope().expect("scope").is_cancelled());
        assert!(!sw.parent_scope().expect("parent").is_cancelled());

        let ev = rx.try_recv().expect("one stop event");
        assert_eq!(ev.kind, EventKind::StopRequested);
        assert!(rx.try_recv().is_err(), "second stop_only publishes nothing");
    }

    #[tokio::test]
    async fn stop_and_wait_before_start_returns() -> anyhow::Result<()> {
        let sw = StopWaiter::new();
        sw.stop_and_wait().await?;
        assert!(sw.stopped());
        Ok(())
    }

    #[tokio::test]
    async fn launch_after_stop_never_runs() -> anyhow::Result<()> {
        let sw = started("late-launch");
        sw.stop_only();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        sw.launch(move |_| async move { flag.store(true, Ordering::SeqCst) })?;

        sw.stop_and_wait().await?;
        tokio::task::yield_now().await;
        assert!(!ran.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_wait_waits_for_tasks() -> anyhow::Result<()> {
        let sw = started("drain");
        let finished = Arc::new(AtomicUsize::new(0));
        for i in 0..4u64 {
            let finished = Arc::clone(&finished);
            sw.launch(move |scope| async move {
                scope.cancelled().await;
                time::sleep(Duration::from_millis(10 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })?;
        }
        assert_eq!(sw.live_tasks(), 4);

        sw.stop_and_wait().await?;
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert_eq!(sw.live_tasks(), 0);
        assert!(sw.wait_handle()?.fired());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stop_and_wait_both_wait() -> anyhow::Result<()> {
        let sw = Arc::new(started("concurrent"));
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        sw.launch(move |scope| async move {
            scope.cancelled().await;
            time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        })?;

        let a = tokio::spawn({
            let sw = Arc::clone(&sw);
            let finished = Arc::clone(&finished);
            async move {
                sw.stop_and_wait().await.expect("stop a");
                finished.load(Ordering::SeqCst)
            }
        });
        let b = tokio::spawn({
            let sw = Arc::clone(&sw);
            let finished = Arc::clone(&finished);
            async move {
                sw.stop_only();
                sw.stop_and_wait().await.expect("stop b");
                finished.load(Ordering::SeqCst)
            }
        });

        assert!(a.await?, "first caller returned before drain");
        assert!(b.await?, "second caller returned before drain");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stop_warns_then_returns() -> anyhow::Result<()> {
        let sw = StopWaiter::with_config(Config {
            bus_capacity: 1024,
            ..Config::default()
        });
        sw.start(&CancellationToken::new(), "slow")?;
        let mut rx = sw.subscribe();
        sw.launch(|_scope| async move {
            time::sleep(Duration::from_millis(50)).await;
        })?;

        sw.stop_only();
        let drain = sw.wait_handle()?;
        // 3ms steps never coincide with the task finishing at 50ms
        let warnings = sw.wait_drained(&drain, Duration::from_millis(3)).await;
        assert!((15..=17).contains(&warnings), "{warnings}");
        assert_eq!(sw.live_tasks(), 0);

        let mut delayed = 0;
        let mut saw_drained = false;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::StopDelayed => {
                    delayed += 1;
                    assert_eq!(ev.live, Some(1));
                    let reason = ev.reason.as_deref().unwrap_or_default();
                    assert!(reason.contains("src/core/waiter.rs"), "{reason}");
                }
                EventKind::Drained => saw_drained = true,
                _ => {}
            }
        }
        assert_eq!(delayed, warnings);
        assert!(saw_drained);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn single_warning_when_repeat_disabled() -> anyhow::Result<()> {
        let sw = StopWaiter::with_config(Config {
            repeat_warnings: false,
            ..Config::default()
        });
        sw.start(&CancellationToken::new(), "once")?;
        sw.launch(|_| async move { time::sleep(Duration::from_millis(50)).await })?;

        sw.stop_only();
        let drain = sw.wait_handle()?;
        assert_eq!(sw.wait_drained(&drain, Duration::from_millis(1)).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn wait_handle_is_shared() -> anyhow::Result<()> {
        let sw = started("shared");
        let a = sw.wait_handle()?;
        let b = sw.wait_handle()?;
        assert!(!a.fired());

        sw.stop_only();
        a.wait().await;
        assert!(b.fired());
        Ok(())
    }

    #[tokio::test]
    async fn panicking_task_still_drains() -> anyhow::Result<()> {
        let sw = started("panic");
        sw.launch(|_| async {
            let fail = true;
            if fail {
                panic!("task blew up");
            }
        })?;
        sw.stop_and_wait_timeout(Duration::from_secs(5)).await?;
        assert_eq!(sw.live_tasks(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn parent_cancel_drains_without_stop() -> anyhow::Result<()> {
        let parent = CancellationToken::new();
        let sw = StopWaiter::new();
        sw.start(&parent, "parent")?;
        sw.launch(|scope| async move { scope.cancelled().await })?;

        parent.cancel();
        sw.wait_handle()?.wait().await;
        assert!(!sw.stopped());
        assert_eq!(sw.live_tasks(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn untracked_outlives_stop() -> anyhow::Result<()> {
        let sw = started("untracked");
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = sw.launch_untracked(async move { rx.await.is_ok() });

        sw.stop_and_wait().await?;
        assert!(!handle.is_finished());
        tx.send(()).map_err(|_| anyhow::anyhow!("receiver gone"))?;
        assert!(handle.await?);
        Ok(())
    }
}
