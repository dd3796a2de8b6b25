// ── Snapshot poller ──
//
// Runs a query immediately and then on a fixed interval, handing each
// successful result to an apply callback. Stopping cancels future polls
// but lets an in-flight query finish; its result is then dropped rather
// than applied. The cancellation check and `apply` run under one gate
// that `stop()` also takes, so once `stop()` returns nothing more is
// applied. Failures are recorded in `PollState` and never reach the
// apply callback.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

// ── PollState ────────────────────────────────────────────────────────

/// Observable status of one poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// True until the first response, success or failure, arrives.
    pub loading: bool,
    /// Message from the most recent failed poll; cleared on success.
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    /// Completed polls, successful or not.
    pub polls: u64,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            loading: true,
            last_error: None,
            last_success: None,
            polls: 0,
        }
    }
}

// ── SnapshotPoller ───────────────────────────────────────────────────

/// Builder for a periodic query.
#[derive(Debug, Clone)]
pub struct SnapshotPoller {
    name: &'static str,
    interval: Duration,
    timeout: Duration,
}

impl SnapshotPoller {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval: interval.max(MIN_INTERVAL),
            timeout: fleetsync_api::transport::DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Bound each query. A query that overruns counts as a failed poll.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn the poll loop on the current Tokio runtime.
    pub fn start<T, Q, Fut, A>(self, query: Q, apply: A) -> PollerHandle
    where
        T: Send + 'static,
        Q: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
        A: FnMut(T) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let gate = Arc::new(Mutex::new(()));
        let (state_tx, state_rx) = watch::channel(PollState::default());

        let task = tokio::spawn(poll_loop(
            self.clone(),
            query,
            apply,
            cancel.clone(),
            Arc::clone(&gate),
            Arc::clone(&refresh),
            state_tx,
        ));
        debug!(poller = self.name, interval = ?self.interval, "poller started");

        PollerHandle {
            name: self.name,
            cancel,
            gate,
            refresh,
            state: state_rx,
            task: Some(task),
        }
    }
}

// ── PollerHandle ─────────────────────────────────────────────────────

/// Control handle for a running poller. Dropping it stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    name: &'static str,
    cancel: CancellationToken,
    gate: Arc<Mutex<()>>,
    refresh: Arc<Notify>,
    state: watch::Receiver<PollState>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel future polls. An in-flight query may finish; its result
    /// is discarded. If a result is being applied right now, waits for
    /// it. Safe to call repeatedly, but not from inside `apply`.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(poller = self.name, "poller stopping");
            self.cancel.cancel();
        }
        drop(lock(&self.gate));
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Poll now instead of waiting for the next tick. The interval
    /// restarts from this poll.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Current state snapshot.
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Stop and wait for the loop to exit, including any in-flight query.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Poll loop ────────────────────────────────────────────────────────

async fn poll_loop<T, Q, Fut, A>(
    poller: SnapshotPoller,
    mut query: Q,
    mut apply: A,
    cancel: CancellationToken,
    gate: Arc<Mutex<()>>,
    refresh: Arc<Notify>,
    state: watch::Sender<PollState>,
) where
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
    A: FnMut(T),
{
    let name = poller.name;
    let mut ticker = tokio::time::interval(poller.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = refresh.notified() => ticker.reset(),
            _ = ticker.tick() => {}
        }

        let outcome = match tokio::time::timeout(poller.timeout, query()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: poller.timeout.as_secs(),
            }),
        };

        // No await while the gate is held.
        {
            let _gate = lock(&gate);
            if cancel.is_cancelled() {
                debug!(poller = name, "discarding response that arrived after stop");
                break;
            }

            match outcome {
                Ok(value) => {
                    apply(value);
                    state.send_modify(|s| {
                        s.loading = false;
                        s.last_error = None;
                        s.last_success = Some(Utc::now());
                        s.polls += 1;
                    });
                }
                Err(e) => {
                    warn!(poller = name, error = %e, "poll failed; keeping last good data");
                    state.send_modify(|s| {
                        s.loading = false;
                        s.last_error = Some(e.to_string());
                        s.polls += 1;
                    });
                }
            }
        }
    }

    debug!(poller = name, "poller stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::{Instant, sleep};

    use super::*;

    fn counting_query(
        calls: &Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, CoreError>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn collector() -> (Arc<Mutex<Vec<u32>>>, impl FnMut(u32) + Send + 'static) {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&applied);
        (applied, move |v| sink.lock().unwrap().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_every_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let (applied, apply) = collector();

        let handle = SnapshotPoller::new("fleet", Duration::from_secs(5))
            .start(counting_query(&calls), apply);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.state().loading);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*applied.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(handle.state().polls, 3);

        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_records_error_without_applying() {
        let (applied, apply) = collector();
        let handle = SnapshotPoller::new("overview", Duration::from_secs(10)).start(
            || async { Err::<u32, _>(CoreError::Api { message: "boom".into(), status: Some(500) }) },
            apply,
        );

        sleep(Duration::from_millis(10)).await;
        let state = handle.state();
        assert!(!state.loading);
        assert_eq!(state.polls, 1);
        assert!(state.last_error.unwrap().contains("boom"));
        assert!(state.last_success.is_none());
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_stop_is_discarded() {
        let (applied, apply) = collector();
        let handle = SnapshotPoller::new("fleet", Duration::from_secs(5)).start(
            || async {
                sleep(Duration::from_secs(3)).await;
                Ok(7)
            },
            apply,
        );

        sleep(Duration::from_secs(1)).await;
        handle.stop();
        let started = Instant::now();
        handle.join().await;

        // The in-flight query was allowed to finish...
        assert!(started.elapsed() >= Duration::from_secs(2));
        // ...but its result never reached the store.
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_future_polls() {
        let calls = Arc::new(AtomicU32::new(0));
        let (_applied, apply) = collector();
        let handle =
            SnapshotPoller::new("stats", Duration::from_secs(30)).start(counting_query(&calls), apply);

        sleep(Duration::from_millis(10)).await;
        handle.stop();
        handle.stop();
        sleep(Duration::from_secs(120)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_times_out() {
        let (applied, apply) = collector();
        let handle = SnapshotPoller::new("fleet", Duration::from_secs(60))
            .with_timeout(Duration::from_secs(2))
            .start(
                || async {
                    sleep(Duration::from_secs(30)).await;
                    Ok(1)
                },
                apply,
            );

        sleep(Duration::from_secs(3)).await;
        let state = handle.state();
        assert!(state.last_error.unwrap().contains("2s"));
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_polls_ahead_of_schedule() {
        let calls = Arc::new(AtomicU32::new(0));
        let (_applied, apply) = collector();
        let handle =
            SnapshotPoller::new("fleet", Duration::from_secs(30)).start(counting_query(&calls), apply);

        sleep(Duration::from_secs(1)).await;
        handle.refresh_now();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_previous_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let (applied, apply) = collector();
        let handle = SnapshotPoller::new("fleet", Duration::from_secs(5)).start(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(CoreError::Timeout { timeout_secs: 10 })
                    } else {
                        Ok(n)
                    }
                }
            },
            apply,
        );

        sleep(Duration::from_millis(10)).await;
        assert!(handle.state().last_error.is_some());

        sleep(Duration::from_secs(5)).await;
        let state = handle.state();
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_some());
        assert_eq!(*applied.lock().unwrap(), vec![1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_waits_for_an_apply_in_progress() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&applied);
        let handle = SnapshotPoller::new("fleet", Duration::from_secs(60)).start(
            || async { Ok(1_u32) },
            move |v| {
                let _ = entered_tx.send(());
                std::thread::sleep(Duration::from_millis(100));
                sink.lock().unwrap().push(v);
            },
        );

        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();
        handle.stop();

        // The apply that was under way has finished; nothing follows it.
        assert_eq!(*applied.lock().unwrap(), vec![1]);
        handle.refresh_now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*applied.lock().unwrap(), vec![1]);
    }
}
