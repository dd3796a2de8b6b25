//! Command dispatch: bridges CLI args to `FleetSync` and output formatting.

pub mod buses;
pub mod config_cmd;
pub mod fleet;
pub mod watch;

use std::sync::Arc;

use fleetsync_core::{FleetSync, VehicleFilter, VehicleRecord};

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// How results should be printed.
#[derive(Debug, Clone, Copy)]
pub struct Render {
    pub format: OutputFormat,
    pub quiet: bool,
    pub color: bool,
}

/// Dispatch a backend-bound command to its handler.
pub async fn dispatch(cmd: Command, sync: &FleetSync, render: Render) -> Result<(), CliError> {
    match cmd {
        Command::Overview => fleet::overview(sync, render).await,
        Command::Stats => fleet::stats(sync, render).await,
        Command::Routes => fleet::routes(sync, render).await,
        Command::Health => fleet::health(sync, render).await,
        Command::Buses(args) => buses::list(sync, &args, render).await,
        Command::Bus { id } => buses::show(sync, &id, render).await,
        Command::History(args) => buses::history(sync, &args, render).await,
        Command::Map => buses::map(sync, render).await,
        Command::Watch(args) => watch::run(sync, &args, render).await,
        // Handled before a FleetSync is built.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Records matching every filter, sorted by id.
pub(crate) fn select(
    records: Vec<Arc<VehicleRecord>>,
    filters: &[VehicleFilter],
) -> Vec<Arc<VehicleRecord>> {
    records
        .into_iter()
        .filter(|r| filters.iter().all(|f| f.matches(r)))
        .collect()
}
