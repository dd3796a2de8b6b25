// ── In-process event dispatcher ──
//
// A registry of handlers keyed by event kind. Publishing is synchronous:
// every handler registered when `publish` starts runs, in registration
// order, on the caller's thread before `publish` returns. A handler that
// errors or panics is logged and skipped; the rest still run.

use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::error::CoreError;
use crate::model::VehicleFragment;

// ── Handler types ────────────────────────────────────────────────────

/// Failure reported by a handler. Logged by the dispatcher, never
/// propagated to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<CoreError> for HandlerError {
    fn from(err: CoreError) -> Self {
        Self::new(err.to_string())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

type Handler<P> = Arc<dyn Fn(&P) -> HandlerResult + Send + Sync>;

struct Registration<P> {
    token: u64,
    handler: Handler<P>,
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

// ── EventDispatcher ──────────────────────────────────────────────────

struct Registry<K, P> {
    handlers: DashMap<K, Vec<Registration<P>>>,
    next_token: AtomicU64,
}

/// Publish/subscribe registry.
///
/// Cheaply cloneable; clones share one registry.
pub struct EventDispatcher<K, P> {
    registry: Arc<Registry<K, P>>,
}

impl<K, P> Clone for EventDispatcher<K, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<K, P> Default for EventDispatcher<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    P: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> EventDispatcher<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    P: 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                handlers: DashMap::new(),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for `kind`.
    ///
    /// The same closure may be registered more than once; each call
    /// yields an independent registration with its own token.
    pub fn subscribe<F>(&self, kind: K, handler: F) -> Subscription
    where
        F: Fn(&P) -> HandlerResult + Send + Sync + 'static,
    {
        let token = self.registry.next_token.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers
            .entry(kind.clone())
            .or_default()
            .push(Registration {
                token,
                handler: Arc::new(handler),
            });
        trace!(?kind, token, "handler registered");

        let registry: Weak<Registry<K, P>> = Arc::downgrade(&self.registry);
        Subscription {
            inner: Arc::new(SubscriptionInner {
                token,
                active: AtomicBool::new(true),
                remove: Box::new(move || {
                    let Some(registry) = registry.upgrade() else {
                        return;
                    };
                    if let Some(mut regs) = registry.handlers.get_mut(&kind) {
                        regs.retain(|r| r.token != token);
                    }
                    registry.handlers.remove_if(&kind, |_, regs| regs.is_empty());
                }),
            }),
        }
    }

    /// Invoke every handler currently registered for `kind`.
    pub fn publish(&self, kind: &K, payload: &P) -> PublishReport {
        // Clone handles out so handlers may (un)subscribe without
        // contending on the shard lock.
        let handlers: Vec<(u64, Handler<P>)> = match self.registry.handlers.get(kind) {
            Some(regs) => regs
                .iter()
                .map(|r| (r.token, Arc::clone(&r.handler)))
                .collect(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for (token, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(?kind, token, error = %e, "event handler failed");
                    report.failed += 1;
                }
                Err(panic) => {
                    warn!(
                        ?kind,
                        token,
                        panic = panic_message(panic.as_ref()),
                        "event handler panicked"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Number of live registrations for `kind`.
    pub fn handler_count(&self, kind: &K) -> usize {
        self.registry.handlers.get(kind).map_or(0, |regs| regs.len())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// ── Subscription ─────────────────────────────────────────────────────

struct SubscriptionInner {
    token: u64,
    active: AtomicBool,
    remove: Box<dyn Fn() + Send + Sync>,
}

/// Handle for one registration.
///
/// Dropping it does *not* unsubscribe; call [`unsubscribe`](Self::unsubscribe).
/// Clones refer to the same registration.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Remove exactly this registration. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            (self.inner.remove)();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn token(&self) -> u64 {
        self.inner.token
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.inner.token)
            .field("active", &self.is_active())
            .finish()
    }
}

// ── Channel events ───────────────────────────────────────────────────

/// The three event kinds the push channel emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Connected,
    Disconnected,
    Update,
}

/// Why a push session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Explicit,
    /// The remote closed or the socket failed; reconnection follows.
    Lost,
    /// Every reconnect attempt failed; the channel has given up.
    Exhausted { attempts: u32 },
}

/// Payload published by the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected(DisconnectReason),
    Update(VehicleFragment),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected(_) => EventKind::Disconnected,
            Self::Update(_) => EventKind::Update,
        }
    }
}

/// The dispatcher the push channel publishes into.
pub type ChannelDispatcher = EventDispatcher<EventKind, ChannelEvent>;

impl ChannelDispatcher {
    /// Publish `event` under its own kind.
    pub fn emit(&self, event: &ChannelEvent) -> PublishReport {
        self.publish(&event.kind(), event)
    }
}
