//! Live fleet view: runs `FleetSync` and reprints the fleet on every change.

use std::future;

use chrono::Local;
use owo_colors::OwoColorize;

use fleetsync_core::{ChannelState, FleetSync, FleetView, VehicleFilter};

use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::buses::VehicleRow;
use super::{Render, select};

pub async fn run(sync: &FleetSync, args: &WatchArgs, render: Render) -> Result<(), CliError> {
    let filters = args.filter.filters();
    let mut fleet = sync.store().subscribe();
    let mut channel = sync.channel_state();
    sync.start();

    let deadline = async {
        match args.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let result = loop {
        tokio::select! {
            () = &mut deadline => break Ok(()),
            signal = tokio::signal::ctrl_c() => break signal.map_err(CliError::from),
            view = fleet.changed() => {
                let Some(view) = view else { break Ok(()) };
                let state = *channel.borrow();
                if let Err(e) = print_view(&view, state, &filters, render) {
                    break Err(e);
                }
            }
            Ok(()) = channel.changed() => {
                let state = *channel.borrow_and_update();
                report_channel(state, render);
            }
        }
    };

    sync.shutdown();
    result
}

fn print_view(
    view: &FleetView,
    state: ChannelState,
    filters: &[VehicleFilter],
    render: Render,
) -> Result<(), CliError> {
    let records = select(view.sorted(), filters);
    let body = output::render_list(
        render.format,
        &records,
        |v| VehicleRow::new(v, render.color),
        |v| v.vehicle_id.clone(),
    )?;

    if render.format == OutputFormat::Table && !render.quiet {
        let header = format!(
            "{}  {}/{} online  push: {state}",
            Local::now().format("%H:%M:%S"),
            view.online_count(),
            view.len(),
        );
        if render.color {
            output::print_output(&header.bold().to_string(), false);
        } else {
            output::print_output(&header, false);
        }
    }
    output::print_output(&body, render.quiet);
    Ok(())
}

fn report_channel(state: ChannelState, render: Render) {
    if render.quiet {
        return;
    }
    match state {
        ChannelState::Failed if render.color => {
            eprintln!("{}", "push channel gave up; showing polled data only".yellow());
        }
        ChannelState::Failed => eprintln!("push channel gave up; showing polled data only"),
        other => eprintln!("push: {other}"),
    }
}
