// ── Fleet-wide aggregates ──
//
// Computed by the backend. The client displays them as-is and never
// derives them from the vehicle view.

use serde::{Deserialize, Serialize};

/// Dry/wet split across the fleet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadConditionCounts {
    pub dry: u32,
    pub wet: u32,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetOverview {
    pub total_buses: u32,
    pub online_buses: u32,
    pub average_speed: f64,
    pub total_passengers: u32,
    pub road_conditions: RoadConditionCounts,
}

impl FleetOverview {
    /// Online share in `0.0..=1.0`; zero for an empty fleet.
    pub fn online_ratio(&self) -> f64 {
        if self.total_buses == 0 {
            return 0.0;
        }
        f64::from(self.online_buses) / f64::from(self.total_buses)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedBucket {
    pub range: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStatistics {
    pub speed_distribution: Vec<SpeedBucket>,
}

impl FleetStatistics {
    pub fn total_samples(&self) -> u32 {
        self.speed_distribution.iter().map(|b| b.count).sum()
    }
}

/// A route and how many vehicles serve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub route_id: String,
    pub bus_count: Option<u32>,
    /// Any further attributes the backend attaches to a route.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Backend liveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "healthy" | "ok" | "up"
        )
    }
}
