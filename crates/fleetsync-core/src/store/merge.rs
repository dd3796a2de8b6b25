// ── Partial update merge ──
//
// A push fragment overwrites exactly the fields it carries and nothing
// else. Its arrival is evidence of liveness, so the vehicle goes online
// regardless of what the last snapshot said.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::FleetStore;
use crate::error::CoreError;
use crate::model::{VehicleFragment, VehicleRecord, VehicleStatus};

fn overlay<T: Clone>(slot: &mut Option<T>, incoming: Option<&T>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}

/// Overwrite every field `fragment` carries; leave the rest alone.
pub(crate) fn merge_fragment(
    record: &mut VehicleRecord,
    fragment: &VehicleFragment,
    arrived: DateTime<Utc>,
) {
    overlay(&mut record.route_id, fragment.route_id.as_ref());
    overlay(&mut record.location_name, fragment.location_name.as_ref());
    overlay(&mut record.direction, fragment.direction.as_ref());
    overlay(&mut record.latitude, fragment.latitude.as_ref());
    overlay(&mut record.longitude, fragment.longitude.as_ref());
    overlay(&mut record.safe_speed, fragment.safe_speed.as_ref());
    overlay(&mut record.passenger_count, fragment.passenger_count.as_ref());
    overlay(&mut record.passenger_load_kg, fragment.passenger_load_kg.as_ref());
    overlay(&mut record.temperature, fragment.temperature.as_ref());
    overlay(&mut record.humidity, fragment.humidity.as_ref());
    overlay(&mut record.road_condition, fragment.road_condition.as_ref());
    record.status = VehicleStatus::Online;
    record.last_update = fragment.last_update.unwrap_or(arrived);
}

impl FleetStore {
    /// Merge one push fragment into the view.
    ///
    /// Unknown vehicles are created from the fragment's fields alone.
    /// A blank `vehicle_id` is rejected and the view is left untouched.
    pub fn apply_partial_update(&self, fragment: &VehicleFragment) -> Result<(), CoreError> {
        if fragment.vehicle_id.trim().is_empty() {
            return Err(CoreError::MalformedFragment {
                reason: "empty vehicle_id".into(),
            });
        }

        let arrived = Utc::now();
        self.view.send_modify(|view| {
            let view = Arc::make_mut(view);
            let mut record = match view.records.get(&fragment.vehicle_id) {
                Some(existing) => VehicleRecord::clone(existing),
                None => VehicleRecord::bare(
                    fragment.vehicle_id.clone(),
                    VehicleStatus::Online,
                    arrived,
                ),
            };
            merge_fragment(&mut record, fragment, arrived);
            view.records
                .insert(fragment.vehicle_id.clone(), Arc::new(record));
        });
        self.last_push.send_replace(Some(arrived));

        trace!(vehicle_id = %fragment.vehicle_id, "partial update merged");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::RoadCondition;

    fn snapshot_b1() -> VehicleRecord {
        VehicleRecord {
            route_id: Some("R12".into()),
            location_name: Some("Central Station".into()),
            safe_speed: Some(40.0),
            passenger_count: Some(20),
            road_condition: Some(RoadCondition::Dry),
            ..VehicleRecord::bare("B1", VehicleStatus::Online, Utc::now())
        }
    }

    #[test]
    fn update_overwrites_only_named_fields() {
        let store = FleetStore::new();
        store.apply_snapshot(vec![snapshot_b1()]);

        let fragment = VehicleFragment {
            safe_speed: Some(55.0),
            ..VehicleFragment::new("B1")
        };
        store.apply_partial_update(&fragment).unwrap();

        let b1 = store.vehicle("B1").unwrap();
        assert_eq!(b1.safe_speed, Some(55.0));
        assert_eq!(b1.status, VehicleStatus::Online);
        assert_eq!(b1.route_id.as_deref(), Some("R12"));
        assert_eq!(b1.location_name.as_deref(), Some("Central Station"));
        assert_eq!(b1.passenger_count, Some(20));
        assert_eq!(b1.road_condition, Some(RoadCondition::Dry));
    }

    #[test]
    fn update_for_unknown_vehicle_creates_exactly_its_fields() {
        let store = FleetStore::new();
        let fragment = VehicleFragment {
            passenger_count: Some(12),
            ..VehicleFragment::new("B2")
        };
        store.apply_partial_update(&fragment).unwrap();

        assert_eq!(store.len(), 1);
        let b2 = store.vehicle("B2").unwrap();
        assert_eq!(
            VehicleRecord::clone(&b2),
            VehicleRecord {
                passenger_count: Some(12),
                ..VehicleRecord::bare("B2", VehicleStatus::Online, b2.last_update)
            }
        );
        assert_eq!(b2.safe_speed, None);
        assert!(store.last_push_at().is_some());
        assert!(!store.has_loaded());
    }

    #[test]
    fn update_revives_vehicle_marked_offline() {
        let store = FleetStore::new();
        let mut offline = snapshot_b1();
        offline.status = VehicleStatus::Offline;
        store.apply_snapshot(vec![offline]);

        store
            .apply_partial_update(&VehicleFragment::new("B1"))
            .unwrap();

        assert!(store.vehicle("B1").unwrap().is_online());
    }

    #[test]
    fn blank_vehicle_id_is_rejected_without_touching_view() {
        let store = FleetStore::new();
        store.apply_snapshot(vec![snapshot_b1()]);
        let before = store.view();

        let err = store
            .apply_partial_update(&VehicleFragment {
                safe_speed: Some(99.0),
                ..VehicleFragment::new("  ")
            })
            .unwrap_err();

        assert!(matches!(err, CoreError::MalformedFragment { .. }));
        assert_eq!(*store.view(), *before);
    }

    #[test]
    fn embedded_timestamp_wins_over_arrival_time() {
        let store = FleetStore::new();
        let sent = Utc::now() - chrono::TimeDelta::seconds(3);
        store
            .apply_partial_update(&VehicleFragment {
                last_update: Some(sent),
                ..VehicleFragment::new("B3")
            })
            .unwrap();
        assert_eq!(store.vehicle("B3").unwrap().last_update, sent);
    }

    #[test]
    fn snapshot_then_updates_loses_no_untouched_fields() {
        let store = FleetStore::new();
        let mut b2 = snapshot_b1();
        b2.vehicle_id = "B2".into();
        b2.humidity = Some(71.0);
        store.apply_snapshot(vec![snapshot_b1(), b2]);

        for speed in [41.0, 42.0, 43.0] {
            store
                .apply_partial_update(&VehicleFragment {
                    safe_speed: Some(speed),
                    ..VehicleFragment::new("B1")
                })
                .unwrap();
        }
        store
            .apply_partial_update(&VehicleFragment {
                temperature: Some(29.5),
                ..VehicleFragment::new("B2")
            })
            .unwrap();

        let b1 = store.vehicle("B1").unwrap();
        let b2 = store.vehicle("B2").unwrap();
        assert_eq!(b1.safe_speed, Some(43.0));
        assert_eq!(b1.passenger_count, Some(20));
        assert_eq!(b2.safe_speed, Some(40.0));
        assert_eq!(b2.humidity, Some(71.0));
        assert_eq!(b2.temperature, Some(29.5));
    }

    #[test]
    fn readers_keep_their_view_across_updates() {
        let store = FleetStore::new();
        store.apply_snapshot(vec![snapshot_b1()]);
        let held = store.view();

        store
            .apply_partial_update(&VehicleFragment {
                safe_speed: Some(70.0),
                ..VehicleFragment::new("B1")
            })
            .unwrap();

        assert_eq!(held.get("B1").unwrap().safe_speed, Some(40.0));
        assert_eq!(store.vehicle("B1").unwrap().safe_speed, Some(70.0));
    }
}
