// ── Filter predicates for fleet views ──
//
// Used by presentation code to narrow a view without re-querying.

use crate::model::VehicleRecord;

/// Filter predicate over vehicle records.
pub enum VehicleFilter {
    All,
    Online,
    Offline,
    Route(String),
    /// Case-insensitive substring match over id, route, and location.
    Search(String),
    Custom(Box<dyn Fn(&VehicleRecord) -> bool + Send + Sync>),
}

impl VehicleFilter {
    pub fn matches(&self, record: &VehicleRecord) -> bool {
        match self {
            Self::All => true,
            Self::Online => record.is_online(),
            Self::Offline => !record.is_online(),
            Self::Route(route) => record.route_id.as_deref() == Some(route.as_str()),
            Self::Search(needle) => {
                let needle = needle.trim().to_lowercase();
                needle.is_empty()
                    || [
                        Some(record.vehicle_id.as_str()),
                        record.route_id.as_deref(),
                        record.location_name.as_deref(),
                    ]
                    .into_iter()
                    .flatten()
                    .any(|hay| hay.to_lowercase().contains(&needle))
            }
            Self::Custom(f) => f(record),
        }
    }
}

impl std::fmt::Debug for VehicleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Online => f.write_str("Online"),
            Self::Offline => f.write_str("Offline"),
            Self::Route(r) => f.debug_tuple("Route").field(r).finish(),
            Self::Search(s) => f.debug_tuple("Search").field(s).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
