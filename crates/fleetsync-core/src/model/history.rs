// ── Telemetry history ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vehicle::RoadCondition;

/// One immutable point-in-time reading. Owned by the backend; the client
/// only ever receives these newest-first for a bounded lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub safe_speed: Option<f64>,
    pub passenger_count: Option<u32>,
    pub passenger_load_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub road_condition: Option<RoadCondition>,
}
