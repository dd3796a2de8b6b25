// ── Reconciliation store ──
//
// Snapshot-replace plus field-level partial merge over one keyed view.

mod fleet_store;
mod merge;
mod snapshot;
mod view;

pub use fleet_store::FleetStore;
pub use snapshot::SnapshotOutcome;
pub use view::FleetView;
