// ── Reconciliation store ──
//
// Owns the only mutable fleet state. Two writers feed it: the snapshot
// poller (`apply_snapshot`, in `snapshot.rs`) and the push channel
// (`apply_partial_update`, in `merge.rs`). Every mutation publishes a
// whole new `Arc<FleetView>` through a `watch` channel, so readers never
// observe a half-applied change and reads never touch I/O.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::view::FleetView;
use crate::model::VehicleRecord;
use crate::stream::FleetStream;

/// Reactive, keyed fleet state.
pub struct FleetStore {
    pub(crate) view: watch::Sender<Arc<FleetView>>,
    pub(crate) retain_absent_for: Option<Duration>,
    pub(crate) last_snapshot: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_push: watch::Sender<Option<DateTime<Utc>>>,
}

impl FleetStore {
    /// A store that keeps vehicles missing from snapshots indefinitely
    /// (marked offline).
    pub fn new() -> Self {
        Self::with_retention(None)
    }

    /// A store that evicts vehicles missing from a snapshot once their
    /// `last_update` is older than `retain_absent_for`.
    pub fn with_retention(retain_absent_for: Option<Duration>) -> Self {
        let (view, _) = watch::channel(Arc::new(FleetView::default()));
        let (last_snapshot, _) = watch::channel(None);
        let (last_push, _) = watch::channel(None);

        Self {
            view,
            retain_absent_for,
            last_snapshot,
            last_push,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current view.
    pub fn view(&self) -> Arc<FleetView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn vehicle(&self, vehicle_id: &str) -> Option<Arc<VehicleRecord>> {
        self.view.borrow().get(vehicle_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.view.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.borrow().is_empty()
    }

    pub fn subscribe(&self) -> FleetStream {
        FleetStream::new(self.view.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot.borrow()
    }

    pub fn last_push_at(&self) -> Option<DateTime<Utc>> {
        *self.last_push.borrow()
    }

    /// How long ago the last snapshot landed, or `None` if none has.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_snapshot_at().map(|t| Utc::now() - t)
    }

    /// Whether at least one snapshot has been applied. Before that the
    /// view may hold push-only records and should be shown as loading.
    pub fn has_loaded(&self) -> bool {
        self.last_snapshot_at().is_some()
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}
