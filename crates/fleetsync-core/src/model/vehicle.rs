// ── Vehicle domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness as the client currently believes it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VehicleStatus {
    Online,
    #[default]
    Offline,
}

impl VehicleStatus {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Road surface reported by the vehicle's sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum RoadCondition {
    Dry,
    Wet,
    Unknown,
}

impl RoadCondition {
    /// Lenient parse: `"Dry"`/`"dry"`, `"Wet"`/`"wet"`, anything else is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("dry") {
            Self::Dry
        } else if raw.eq_ignore_ascii_case("wet") {
            Self::Wet
        } else {
            Self::Unknown
        }
    }
}

/// One vehicle in the fleet view.
///
/// Every telemetry field is optional and independently updatable: a
/// vehicle first seen through a push update carries only the fields
/// that update named until a snapshot fills in the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub location_name: Option<String>,
    pub direction: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub safe_speed: Option<f64>,
    pub passenger_count: Option<u32>,
    pub passenger_load_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub road_condition: Option<RoadCondition>,
    pub status: VehicleStatus,
    /// Time of the most recent contribution from either source.
    pub last_update: DateTime<Utc>,
}

impl VehicleRecord {
    /// A record with nothing but a key, a status, and a timestamp.
    pub fn bare(
        vehicle_id: impl Into<String>,
        status: VehicleStatus,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            route_id: None,
            location_name: None,
            direction: None,
            latitude: None,
            longitude: None,
            safe_speed: None,
            passenger_count: None,
            passenger_load_kg: None,
            temperature: None,
            humidity: None,
            road_condition: None,
            status,
            last_update,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    /// `(latitude, longitude)` once both are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// A partial vehicle record from the push channel.
///
/// Only `vehicle_id` is guaranteed. `None` means "not mentioned", never
/// "cleared". Fragments carry no status: their arrival alone marks the
/// vehicle online.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleFragment {
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub location_name: Option<String>,
    pub direction: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub safe_speed: Option<f64>,
    pub passenger_count: Option<u32>,
    pub passenger_load_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub road_condition: Option<RoadCondition>,
    /// Embedded event time, when the backend sent one.
    pub last_update: Option<DateTime<Utc>>,
}

impl VehicleFragment {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            ..Self::default()
        }
    }
}
