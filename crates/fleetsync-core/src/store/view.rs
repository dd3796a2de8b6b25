// ── Immutable fleet view ──

use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::{VehicleRecord, VehicleStatus};
use crate::stream::VehicleFilter;

/// One consistent picture of the fleet, keyed by vehicle id.
///
/// Published whole by `FleetStore`; a `FleetView` you hold never changes
/// underneath you. Iteration order is not meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetView {
    pub(crate) records: IndexMap<String, Arc<VehicleRecord>>,
}

impl FleetView {
    pub fn get(&self, vehicle_id: &str) -> Option<&Arc<VehicleRecord>> {
        self.records.get(vehicle_id)
    }

    pub fn contains(&self, vehicle_id: &str) -> bool {
        self.records.contains_key(vehicle_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<VehicleRecord>> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.count_status(VehicleStatus::Online)
    }

    pub fn offline_count(&self) -> usize {
        self.count_status(VehicleStatus::Offline)
    }

    fn count_status(&self, status: VehicleStatus) -> usize {
        self.iter().filter(|r| r.status == status).count()
    }

    /// Vehicles that can be placed on a map.
    pub fn with_coordinates(&self) -> Vec<Arc<VehicleRecord>> {
        self.iter()
            .filter(|r| r.coordinates().is_some())
            .cloned()
            .collect()
    }

    pub fn filter(&self, filter: &VehicleFilter) -> Vec<Arc<VehicleRecord>> {
        self.iter().filter(|r| filter.matches(r)).cloned().collect()
    }

    /// Records sorted by vehicle id, for stable display.
    pub fn sorted(&self) -> Vec<Arc<VehicleRecord>> {
        let mut records: Vec<_> = self.iter().cloned().collect();
        records.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        records
    }
}
