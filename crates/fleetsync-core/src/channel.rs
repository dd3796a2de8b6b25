// ── Push channel lifecycle ──
//
// Owns connect / reconnect / disconnect for the push socket and turns
// its frames into `ChannelEvent`s on the dispatcher. The channel never
// touches the store; whoever wants updates subscribes to them.
//
// Every run of the background task has its own cancellation token. The
// task checks it, under the publish gate, before every state change and
// every publish, so once `disconnect()` returns nothing from that run
// (or any earlier one) can reach subscribers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use fleetsync_api::{PushConnector, PushFrame, PushSession, ReconnectPolicy};

use crate::dispatch::{ChannelDispatcher, ChannelEvent, DisconnectReason};
use crate::model::VehicleFragment;

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted. Only `connect()` leaves this state.
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

impl ChannelState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a background run is (or should be) in progress.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. }
        )
    }
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Lifecycle manager for the push socket.
///
/// Cheaply cloneable; clones control the same connection. Dropping the
/// last clone cancels any running connection task.
pub struct PushChannel<C: PushConnector> {
    inner: Arc<ChannelInner<C>>,
}

impl<C: PushConnector> Clone for PushChannel<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ChannelInner<C> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

/// State shared with the background task.
struct Shared {
    dispatcher: ChannelDispatcher,
    state: watch::Sender<ChannelState>,
    gate: Mutex<()>,
    sessions: AtomicU64,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, ()> {
        lock(&self.gate)
    }
}

struct Run {
    cancel: CancellationToken,
    /// Set while a session is announced and its `Connected` has gone out
    /// without a matching `Disconnected`.
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl<C> Drop for ChannelInner<C> {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.run).take() {
            run.cancel.cancel();
        }
    }
}

impl<C: PushConnector> PushChannel<C> {
    pub fn new(connector: C, policy: ReconnectPolicy, dispatcher: ChannelDispatcher) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                connector: Arc::new(connector),
                policy,
                shared: Arc::new(Shared {
                    dispatcher,
                    state,
                    gate: Mutex::new(()),
                    sessions: AtomicU64::new(0),
                }),
                run: Mutex::new(None),
            }),
        }
    }

    /// Start connecting in the background.
    ///
    /// A no-op while a run is in progress (connecting, connected, or
    /// reconnecting). From `Disconnected` or `Failed` it starts a fresh
    /// run with a fresh attempt budget. Must be called inside a Tokio
    /// runtime.
    pub fn connect(&self) {
        let mut run = lock(&self.inner.run);
        if run
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.task.is_finished())
        {
            trace!("push channel already running");
            return;
        }

        let cancel = CancellationToken::new();
        let live = Arc::new(AtomicBool::new(false));
        self.inner.shared.state.send_replace(ChannelState::Connecting);

        let ctx = RunContext {
            connector: Arc::clone(&self.inner.connector),
            policy: self.inner.policy,
            shared: Arc::clone(&self.inner.shared),
            cancel: cancel.clone(),
            live: Arc::clone(&live),
        };
        let task = tokio::spawn(run_channel(ctx));
        *run = Some(Run { cancel, live, task });
    }

    /// Tear the connection down now, including any pending connect
    /// attempt or backoff wait.
    ///
    /// Publishes `Disconnected(Explicit)` if a session was up. Safe to
    /// call when already disconnected. Handlers run under the publish
    /// gate, so do not call this synchronously from a channel event
    /// handler; spawn it instead.
    pub fn disconnect(&self) {
        let Some(run) = lock(&self.inner.run).take() else {
            trace!("push channel already disconnected");
            return;
        };

        run.cancel.cancel();
        // Wait out any publish already past its cancellation check.
        drop(self.inner.shared.gate());

        if run.live.swap(false, Ordering::AcqRel) {
            self.inner
                .shared
                .dispatcher
                .emit(&ChannelEvent::Disconnected(DisconnectReason::Explicit));
        }
        self.inner
            .shared
            .state
            .send_replace(ChannelState::Disconnected);
        info!("push channel disconnected");
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.shared.state.subscribe()
    }

    pub fn dispatcher(&self) -> &ChannelDispatcher {
        &self.inner.shared.dispatcher
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    /// Sessions successfully announced since creation.
    pub fn sessions_established(&self) -> u64 {
        self.inner.shared.sessions.load(Ordering::Acquire)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Background run ───────────────────────────────────────────────────

struct RunContext<C> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    live: Arc<AtomicBool>,
}

enum SessionEnd {
    Cancelled,
    AnnounceFailed(fleetsync_api::Error),
    Lost(String),
}

impl<C: PushConnector> RunContext<C> {
    fn set_state(&self, state: ChannelState) {
        let _gate = self.shared.gate();
        if !self.cancel.is_cancelled() {
            self.shared.state.send_replace(state);
        }
    }

    /// Publish unless this run has been cancelled. Returns `false` if it has.
    fn emit(&self, event: &ChannelEvent) -> bool {
        let _gate = self.shared.gate();
        if self.cancel.is_cancelled() {
            return false;
        }
        self.shared.dispatcher.emit(event);
        true
    }

    fn session_opened(&self) -> bool {
        let _gate = self.shared.gate();
        if self.cancel.is_cancelled() {
            return false;
        }
        self.live.store(true, Ordering::Release);
        self.shared.state.send_replace(ChannelState::Connected);
        self.shared.dispatcher.emit(&ChannelEvent::Connected);
        true
    }

    fn session_lost(&self) {
        let _gate = self.shared.gate();
        if self.cancel.is_cancelled() {
            return;
        }
        if self.live.swap(false, Ordering::AcqRel) {
            self.shared
                .dispatcher
                .emit(&ChannelEvent::Disconnected(DisconnectReason::Lost));
        }
    }

    fn give_up(&self, attempts: u32) {
        let _gate = self.shared.gate();
        if self.cancel.is_cancelled() {
            return;
        }
        self.shared.state.send_replace(ChannelState::Failed);
        self.shared
            .dispatcher
            .emit(&ChannelEvent::Disconnected(DisconnectReason::Exhausted {
                attempts,
            }));
    }

    /// Sleep for the reconnect delay. `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.policy.delay) => true,
        }
    }

    /// Route one frame. `false` once the run has been cancelled.
    fn handle_frame(&self, frame: PushFrame) -> bool {
        match frame {
            PushFrame::Update(payload) => match VehicleFragment::try_from(payload) {
                Ok(fragment) => return self.emit(&ChannelEvent::Update(fragment)),
                Err(e) => warn!(error = %e, "dropping push update"),
            },
            PushFrame::Greeting { message } => {
                info!(
                    message = message.as_deref().unwrap_or_default(),
                    "push server greeting"
                );
            }
            PushFrame::Other { event } => debug!(event = %event, "ignoring push event"),
            PushFrame::Malformed { reason } => {
                warn!(reason = %reason, "dropping malformed push frame");
            }
        }
        !self.cancel.is_cancelled()
    }
}

async fn run_channel<C: PushConnector>(ctx: RunContext<C>) {
    let max_attempts = ctx.policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    let mut resumed = false;

    loop {
        attempt += 1;
        ctx.set_state(if attempt == 1 && !resumed {
            ChannelState::Connecting
        } else {
            ChannelState::Reconnecting { attempt }
        });
        debug!(attempt, max_attempts, "connecting push channel");

        let connected = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return,
            result = ctx.connector.connect() => result,
        };

        let failure = match connected {
            Ok(session) => match run_session(&ctx, session).await {
                SessionEnd::Cancelled => return,
                SessionEnd::AnnounceFailed(e) => e.to_string(),
                SessionEnd::Lost(reason) => {
                    warn!(reason = %reason, "push session lost");
                    ctx.session_lost();
                    attempt = 0;
                    resumed = true;
                    ctx.set_state(ChannelState::Reconnecting { attempt: 1 });
                    if !ctx.pause().await {
                        return;
                    }
                    continue;
                }
            },
            Err(e) => e.to_string(),
        };

        warn!(
            attempt,
            max_attempts,
            error = %failure,
            "push channel connect attempt failed"
        );

        if attempt >= max_attempts {
            warn!(attempts = attempt, "push channel giving up");
            ctx.give_up(attempt);
            return;
        }
        if !ctx.pause().await {
            return;
        }
    }
}

async fn run_session<C: PushConnector>(ctx: &RunContext<C>, mut session: C::Session) -> SessionEnd {
    let announced = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => None,
        result = session.announce() => Some(result),
    };
    match announced {
        None => {
            session.close().await;
            return SessionEnd::Cancelled;
        }
        Some(Err(e)) => {
            session.close().await;
            return SessionEnd::AnnounceFailed(e);
        }
        Some(Ok(())) => {}
    }

    if !ctx.session_opened() {
        session.close().await;
        return SessionEnd::Cancelled;
    }
    let session_no = ctx.shared.sessions.fetch_add(1, Ordering::AcqRel) + 1;
    info!(session = session_no, "push channel connected");

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => None,
            frame = session.next_frame() => Some(frame),
        };

        match next {
            None => {
                session.close().await;
                return SessionEnd::Cancelled;
            }
            Some(None) => return SessionEnd::Lost("closed by remote".into()),
            Some(Some(Err(e))) => {
                session.close().await;
                return SessionEnd::Lost(e.to_string());
            }
            Some(Some(Ok(frame))) => {
                if !ctx.handle_frame(frame) {
                    session.close().await;
                    return SessionEnd::Cancelled;
                }
            }
        }
    }
}
