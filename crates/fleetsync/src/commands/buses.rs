//! Vehicle command handlers.

use tabled::Tabled;

use fleetsync_core::{FleetSync, HistoryRecord, VehicleRecord};

use crate::cli::{FilterArgs, HistoryArgs};
use crate::error::CliError;
use crate::output::{self, opt, opt_f64, status_label};

use super::{Render, select};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct VehicleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Speed")]
    speed: String,
    #[tabled(rename = "Pax")]
    passengers: String,
    #[tabled(rename = "Road")]
    road: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl VehicleRow {
    pub(crate) fn new(v: &VehicleRecord, color: bool) -> Self {
        Self {
            id: v.vehicle_id.clone(),
            route: opt(v.route_id.as_deref()),
            status: status_label(v.status, color),
            location: opt(v.location_name.as_deref()),
            speed: opt_f64(v.safe_speed, 1),
            passengers: opt(v.passenger_count),
            road: opt(v.road_condition),
            updated: v.last_update.format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Tabled)]
struct MapRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "Lat")]
    lat: String,
    #[tabled(rename = "Lon")]
    lon: String,
    #[tabled(rename = "Heading")]
    direction: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Speed")]
    speed: String,
    #[tabled(rename = "Pax")]
    passengers: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Road")]
    road: String,
}

fn history_row(h: &HistoryRecord) -> HistoryRow {
    HistoryRow {
        time: h.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        location: opt(h.location_name.as_deref()),
        speed: opt_f64(h.safe_speed, 1),
        passengers: opt(h.passenger_count),
        temperature: opt_f64(h.temperature, 1),
        road: opt(h.road_condition),
    }
}

fn detail(v: &VehicleRecord, color: bool) -> String {
    let coords = v
        .coordinates()
        .map_or_else(|| "-".into(), |(lat, lon)| format!("{lat:.5}, {lon:.5}"));
    [
        format!("ID:          {}", v.vehicle_id),
        format!("Status:      {}", status_label(v.status, color)),
        format!("Route:       {}", opt(v.route_id.as_deref())),
        format!("Location:    {}", opt(v.location_name.as_deref())),
        format!("Direction:   {}", opt(v.direction.as_deref())),
        format!("Coordinates: {coords}"),
        format!("Safe speed:  {}", opt_f64(v.safe_speed, 1)),
        format!("Passengers:  {}", opt(v.passenger_count)),
        format!("Load (kg):   {}", opt_f64(v.passenger_load_kg, 1)),
        format!("Temperature: {}", opt_f64(v.temperature, 1)),
        format!("Humidity:    {}", opt_f64(v.humidity, 1)),
        format!("Road:        {}", opt(v.road_condition)),
        format!("Updated:     {}", v.last_update.to_rfc3339()),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(sync: &FleetSync, args: &FilterArgs, render: Render) -> Result<(), CliError> {
    sync.load_fleet().await?;
    let records = select(sync.store().view().sorted(), &args.filters());
    let out = output::render_list(
        render.format,
        &records,
        |v| VehicleRow::new(v, render.color),
        |v| v.vehicle_id.clone(),
    )?;
    output::print_output(&out, render.quiet);
    Ok(())
}

pub async fn show(sync: &FleetSync, id: &str, render: Render) -> Result<(), CliError> {
    let vehicle = sync
        .vehicle(id)
        .await?
        .ok_or_else(|| CliError::NotFound {
            resource_type: "vehicle".into(),
            identifier: id.into(),
            list_command: "buses".into(),
        })?;
    let out = output::render_single(
        render.format,
        &vehicle,
        |v| detail(v, render.color),
        |v| v.vehicle_id.clone(),
    )?;
    output::print_output(&out, render.quiet);
    Ok(())
}

pub async fn history(sync: &FleetSync, args: &HistoryArgs, render: Render) -> Result<(), CliError> {
    let entries = sync
        .vehicle_history(&args.id, Some(args.hours), Some(args.limit))
        .await?;
    let out = output::render_list(render.format, &entries, history_row, |h| {
        h.timestamp.to_rfc3339()
    })?;
    output::print_output(&out, render.quiet);
    Ok(())
}

pub async fn map(sync: &FleetSync, render: Render) -> Result<(), CliError> {
    let mut records = sync.map_data().await?;
    records.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));

    let out = output::render_list(
        render.format,
        &records,
        |v| {
            let (lat, lon) = v.coordinates().unwrap_or_default();
            MapRow {
                id: v.vehicle_id.clone(),
                route: opt(v.route_id.as_deref()),
                lat: format!("{lat:.5}"),
                lon: format!("{lon:.5}"),
                direction: opt(v.direction.as_deref()),
            }
        },
        |v| v.vehicle_id.clone(),
    )?;
    output::print_output(&out, render.quiet);
    Ok(())
}
