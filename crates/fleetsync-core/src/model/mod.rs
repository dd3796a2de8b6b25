// ── Domain model ──
//
// Canonical fleet types consumed by the store, the CLI, and any other
// presentation layer. Wire payloads are converted into these in
// `crate::convert`.

pub mod fleet;
pub mod history;
pub mod vehicle;

pub use fleet::{
    FleetOverview, FleetStatistics, HealthStatus, RoadConditionCounts, RouteSummary, SpeedBucket,
};
pub use history::HistoryRecord;
pub use vehicle::{RoadCondition, VehicleFragment, VehicleRecord, VehicleStatus};
