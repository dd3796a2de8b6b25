// Wire models for the fleet backend.
//
// These mirror the JSON the backend emits, field for field. They are
// loose (everything optional); `fleetsync-core` converts
// them into strict domain types and decides what a missing field means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Vehicle payloads ────────────────────────────────────────────────

/// A vehicle record as the backend sends it.
///
/// Used for both full snapshot entries (`/api/fleet/buses`, map data,
/// detail) and partial push fragments (`bus_update`), which carry only
/// the fields that changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusPayload {
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub safe_speed: Option<f64>,
    #[serde(default)]
    pub passenger_count: Option<u32>,
    #[serde(default)]
    pub passenger_load_kg: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub road_condition: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_update: Option<DateTime<Utc>>,
}

/// `GET /api/fleet/buses` and `GET /api/fleet/map-data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusListResponse {
    #[serde(default)]
    pub buses: Vec<BusPayload>,
}

// ── History ─────────────────────────────────────────────────────────

/// One point-in-time telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub safe_speed: Option<f64>,
    #[serde(default)]
    pub passenger_count: Option<u32>,
    #[serde(default)]
    pub passenger_load_kg: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub road_condition: Option<String>,
}

/// `GET /api/fleet/buses/{id}/history`. Newest entry first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

// ── Aggregates ──────────────────────────────────────────────────────

/// Dry/wet split reported by the overview endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadConditionCounts {
    #[serde(default)]
    pub dry: u32,
    #[serde(default)]
    pub wet: u32,
}

/// `GET /api/fleet/overview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewResponse {
    #[serde(default)]
    pub total_buses: u32,
    #[serde(default)]
    pub online_buses: u32,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub total_passengers: u32,
    #[serde(default)]
    pub road_conditions: RoadConditionCounts,
}

/// One bar of the speed histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedBucketPayload {
    pub range: String,
    #[serde(default)]
    pub count: u32,
}

/// `GET /api/fleet/statistics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default)]
    pub speed_distribution: Vec<SpeedBucketPayload>,
}

/// A route known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePayload {
    pub route_id: String,
    #[serde(default)]
    pub bus_count: Option<u32>,
    /// All remaining fields the backend sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `GET /api/fleet/routes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<RoutePayload>,
}

/// `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Timestamp parsing ───────────────────────────────────────────────

/// Backend timestamps come either as RFC 3339 or as naive ISO-8601
/// (Python's `datetime.isoformat()` without an offset). Naive values are
/// taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}
