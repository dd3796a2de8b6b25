//! Fleet state synchronization between `fleetsync-api` and presentation
//! layers (CLI, dashboards).
//!
//! - **[`FleetSync`]**: Explicitly owned context. [`start()`](FleetSync::start)
//!   routes push updates into the store, connects the push channel, and
//!   starts the snapshot pollers; [`shutdown()`](FleetSync::shutdown) undoes
//!   all of it. Also exposes on-demand queries (history, routes, health).
//!
//! - **[`FleetStore`]**: Keyed vehicle view behind a `tokio::sync::watch`
//!   channel. Polled snapshots replace it wholesale; pushed fragments merge
//!   field by field. Readers always see a complete, immutable [`FleetView`].
//!
//! - **[`PushChannel`]**: Connect / bounded reconnect / disconnect for the
//!   push socket, publishing [`ChannelEvent`]s through an [`EventDispatcher`].
//!
//! - **[`SnapshotPoller`]**: Immediate-then-periodic query with stale
//!   response suppression after stop.

pub mod channel;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod poller;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::{ChannelState, PushChannel};
pub use config::{PollIntervals, SyncConfig};
pub use dispatch::{
    ChannelDispatcher, ChannelEvent, DisconnectReason, EventDispatcher, EventKind, HandlerError,
    HandlerResult, PublishReport, Subscription,
};
pub use error::CoreError;
pub use poller::{PollState, PollerHandle, SnapshotPoller};
pub use store::{FleetStore, FleetView, SnapshotOutcome};
pub use stream::{FleetStream, VehicleFilter};
pub use sync::FleetSync;

pub use model::{
    FleetOverview, FleetStatistics, HealthStatus, HistoryRecord, RoadCondition,
    RoadConditionCounts, RouteSummary, SpeedBucket, VehicleFragment, VehicleRecord, VehicleStatus,
};

pub use fleetsync_api::ReconnectPolicy;
