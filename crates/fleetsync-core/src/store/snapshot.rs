// ── Snapshot application ──
//
// A snapshot is authoritative for every record it contains: those keys
// are replaced wholesale. Vehicles the snapshot omits are kept but
// marked offline, unless a retention window is configured and they have
// not been heard from within it.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use indexmap::IndexMap;
use tracing::debug;

use super::FleetStore;
use super::view::FleetView;
use crate::model::{VehicleRecord, VehicleStatus};

/// What one `apply_snapshot` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Records taken from the snapshot.
    pub applied: usize,
    /// Previously online vehicles absent from the snapshot, now offline.
    pub marked_offline: usize,
    /// Absent vehicles dropped by the retention window.
    pub evicted: usize,
}

impl FleetStore {
    /// Apply a full fleet listing.
    ///
    /// Duplicate ids inside `records` resolve to the last occurrence.
    /// Applying the same snapshot twice leaves the view as the first call
    /// left it, and watchers are not woken for a no-op.
    pub fn apply_snapshot(&self, records: Vec<VehicleRecord>) -> SnapshotOutcome {
        let now = Utc::now();
        let retention = self
            .retain_absent_for
            .map(|d| TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX));

        let mut outcome = SnapshotOutcome::default();

        self.view.send_if_modified(|current| {
            let mut next: IndexMap<String, Arc<VehicleRecord>> =
                IndexMap::with_capacity(records.len().max(current.len()));
            for record in &records {
                next.insert(record.vehicle_id.clone(), Arc::new(record.clone()));
            }
            outcome.applied = next.len();

            for (id, existing) in &current.records {
                if next.contains_key(id) {
                    continue;
                }
                if retention.is_some_and(|window| {
                    now.signed_duration_since(existing.last_update) > window
                }) {
                    outcome.evicted += 1;
                    continue;
                }
                if existing.status == VehicleStatus::Offline {
                    next.insert(id.clone(), Arc::clone(existing));
                } else {
                    let mut offline = VehicleRecord::clone(existing);
                    offline.status = VehicleStatus::Offline;
                    next.insert(id.clone(), Arc::new(offline));
                    outcome.marked_offline += 1;
                }
            }

            let next = FleetView { records: next };
            if next == **current {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        });

        self.last_snapshot.send_replace(Some(now));
        debug!(
            applied = outcome.applied,
            marked_offline = outcome.marked_offline,
            evicted = outcome.evicted,
            "snapshot applied"
        );
        outcome
    }
}
