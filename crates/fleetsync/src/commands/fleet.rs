//! Fleet-wide command handlers: overview, statistics, routes, health.

use owo_colors::OwoColorize;
use tabled::Tabled;

use fleetsync_core::{FleetOverview, FleetStatistics, FleetSync, HealthStatus, RouteSummary};

use crate::error::CliError;
use crate::output;

use super::Render;

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "Buses")]
    buses: String,
}

#[derive(Tabled)]
struct SpeedRow {
    #[tabled(rename = "Speed range")]
    range: String,
    #[tabled(rename = "Count")]
    count: u32,
}

fn overview_detail(o: &FleetOverview) -> String {
    [
        format!(
            "Buses:       {} ({} online, {:.0}%)",
            o.total_buses,
            o.online_buses,
            o.online_ratio() * 100.0
        ),
        format!("Avg speed:   {:.1}", o.average_speed),
        format!("Passengers:  {}", o.total_passengers),
        format!(
            "Road:        {} dry / {} wet",
            o.road_conditions.dry, o.road_conditions.wet
        ),
    ]
    .join("\n")
}

pub async fn overview(sync: &FleetSync, render: Render) -> Result<(), CliError> {
    let overview = sync.fetch_overview().await?;
    let out = output::render_single(render.format, &overview, overview_detail, |o| {
        format!("{}/{}", o.online_buses, o.total_buses)
    })?;
    output::print_output(&out, render.quiet);
    Ok(())
}

pub async fn stats(sync: &FleetSync, render: Render) -> Result<(), CliError> {
    let stats: FleetStatistics = sync.fetch_statistics().await?;
    let out = output::render_list(
        render.format,
        &stats.speed_distribution,
        |b| SpeedRow {
            range: b.range.clone(),
            count: b.count,
        },
        |b| format!("{}\t{}", b.range, b.count),
    )?;
    output::print_output(&out, render.quiet);
    Ok(())
}

pub async fn routes(sync: &FleetSync, render: Render) -> Result<(), CliError> {
    let routes: Vec<RouteSummary> = sync.routes().await?;
    let out = output::render_list(
        render.format,
        &routes,
        |r| RouteRow {
            route: r.route_id.clone(),
            buses: output::opt(r.bus_count),
        },
        |r| r.route_id.clone(),
    )?;
    output::print_output(&out, render.quiet);
    Ok(())
}

/// Prints the status and fails with a distinct exit code when unhealthy.
pub async fn health(sync: &FleetSync, render: Render) -> Result<(), CliError> {
    let health: HealthStatus = sync.health().await?;
    let healthy = health.is_healthy();
    let out = output::render_single(
        render.format,
        &health,
        |h| match (healthy, render.color) {
            (true, true) => h.status.green().to_string(),
            (false, true) => h.status.red().to_string(),
            (_, false) => h.status.clone(),
        },
        |h| h.status.clone(),
    )?;
    output::print_output(&out, render.quiet);

    if healthy {
        Ok(())
    } else {
        Err(CliError::Unhealthy {
            status: health.status,
        })
    }
}
