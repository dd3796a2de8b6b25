// ── API-to-domain type conversions ──
//
// Bridges raw `fleetsync_api` payloads into `crate::model` types. Wire
// payloads are loose (everything optional); this is where a missing
// field gets its meaning.

use chrono::{DateTime, Utc};
use tracing::warn;

use fleetsync_api::models::{
    BusPayload, HealthResponse, HistoryEntry, OverviewResponse, RoutePayload, StatisticsResponse,
};

use crate::error::CoreError;
use crate::model::{
    FleetOverview, FleetStatistics, HealthStatus, HistoryRecord, RoadCondition,
    RoadConditionCounts, RouteSummary, SpeedBucket, VehicleFragment, VehicleRecord,
    VehicleStatus,
};

// ── Helpers ────────────────────────────────────────────────────────

fn road_condition(raw: Option<&str>) -> Option<RoadCondition> {
    raw.map(RoadCondition::parse)
}

/// Take the vehicle id out of a payload, rejecting absent or blank ids.
fn require_id(raw: Option<String>) -> Result<String, CoreError> {
    match raw {
        Some(id) if !id.trim().is_empty() => Ok(id),
        Some(_) => Err(CoreError::MalformedFragment {
            reason: "empty vehicle_id".into(),
        }),
        None => Err(CoreError::MalformedFragment {
            reason: "missing vehicle_id".into(),
        }),
    }
}

// ── Vehicles ───────────────────────────────────────────────────────

/// Convert one snapshot entry.
///
/// The vehicle is `Online` only if the backend says exactly that; a
/// missing or unrecognised status reads as `Offline`. A missing
/// `last_update` is stamped with `arrived`.
pub fn snapshot_record(
    payload: BusPayload,
    arrived: DateTime<Utc>,
) -> Result<VehicleRecord, CoreError> {
    let vehicle_id = require_id(payload.vehicle_id)?;
    let status = match payload.status.as_deref() {
        Some(s) if s.trim().eq_ignore_ascii_case("online") => VehicleStatus::Online,
        _ => VehicleStatus::Offline,
    };

    Ok(VehicleRecord {
        vehicle_id,
        route_id: payload.route_id,
        location_name: payload.location_name,
        direction: payload.direction,
        latitude: payload.latitude,
        longitude: payload.longitude,
        safe_speed: payload.safe_speed,
        passenger_count: payload.passenger_count,
        passenger_load_kg: payload.passenger_load_kg,
        temperature: payload.temperature,
        humidity: payload.humidity,
        road_condition: road_condition(payload.road_condition.as_deref()),
        status,
        last_update: payload.last_update.unwrap_or(arrived),
    })
}

/// Convert a whole snapshot listing, skipping entries without an id.
pub fn snapshot_records(payloads: Vec<BusPayload>, arrived: DateTime<Utc>) -> Vec<VehicleRecord> {
    payloads
        .into_iter()
        .filter_map(|payload| match snapshot_record(payload, arrived) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping snapshot entry");
                None
            }
        })
        .collect()
}

impl TryFrom<BusPayload> for VehicleFragment {
    type Error = CoreError;

    fn try_from(payload: BusPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            vehicle_id: require_id(payload.vehicle_id)?,
            route_id: payload.route_id,
            location_name: payload.location_name,
            direction: payload.direction,
            latitude: payload.latitude,
            longitude: payload.longitude,
            safe_speed: payload.safe_speed,
            passenger_count: payload.passenger_count,
            passenger_load_kg: payload.passenger_load_kg,
            temperature: payload.temperature,
            humidity: payload.humidity,
            road_condition: road_condition(payload.road_condition.as_deref()),
            last_update: payload.last_update,
        })
    }
}

// ── History ────────────────────────────────────────────────────────

impl From<HistoryEntry> for HistoryRecord {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            location_name: entry.location_name,
            latitude: entry.latitude,
            longitude: entry.longitude,
            safe_speed: entry.safe_speed,
            passenger_count: entry.passenger_count,
            passenger_load_kg: entry.passenger_load_kg,
            temperature: entry.temperature,
            humidity: entry.humidity,
            road_condition: road_condition(entry.road_condition.as_deref()),
        }
    }
}

// ── Aggregates ─────────────────────────────────────────────────────

impl From<OverviewResponse> for FleetOverview {
    fn from(raw: OverviewResponse) -> Self {
        Self {
            total_buses: raw.total_buses,
            online_buses: raw.online_buses,
            average_speed: raw.average_speed,
            total_passengers: raw.total_passengers,
            road_conditions: RoadConditionCounts {
                dry: raw.road_conditions.dry,
                wet: raw.road_conditions.wet,
            },
        }
    }
}

impl From<StatisticsResponse> for FleetStatistics {
    fn from(raw: StatisticsResponse) -> Self {
        Self {
            speed_distribution: raw
                .speed_distribution
                .into_iter()
                .map(|b| SpeedBucket {
                    range: b.range,
                    count: b.count,
                })
                .collect(),
        }
    }
}

impl From<RoutePayload> for RouteSummary {
    fn from(raw: RoutePayload) -> Self {
        Self {
            route_id: raw.route_id,
            bus_count: raw.bus_count,
            attributes: raw.extra,
        }
    }
}

impl From<HealthResponse> for HealthStatus {
    fn from(raw: HealthResponse) -> Self {
        Self {
            status: raw.status,
            details: raw.extra,
        }
    }
}
