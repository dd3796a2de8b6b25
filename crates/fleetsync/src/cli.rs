//! Clap derive structures for the `fleetsync` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fleetsync_core::VehicleFilter;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetsync -- live view of a bus fleet's telemetry
#[derive(Debug, Parser)]
#[command(
    name = "fleetsync",
    version,
    about = "Query and watch fleet telemetry from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config dir)
    #[arg(long, env = "FLEETSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend URL (overrides config)
    #[arg(long, short = 'u', global = true)]
    pub api_url: Option<String>,

    /// Output format (default: from config, else table)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Query timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fleet-wide headline numbers
    Overview,

    /// List vehicles
    #[command(alias = "ls")]
    Buses(FilterArgs),

    /// Show one vehicle
    Bus {
        /// Vehicle id
        id: String,
    },

    /// Telemetry history for one vehicle, newest first
    History(HistoryArgs),

    /// Vehicles with known coordinates
    Map,

    /// Routes and their vehicle counts
    Routes,

    /// Speed distribution
    #[command(alias = "statistics")]
    Stats,

    /// Backend health check
    Health,

    /// Keep a live fleet view, printing it on every change
    Watch(WatchArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command arguments ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Online,
    Offline,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Only vehicles with this status
    #[arg(long)]
    pub status: Option<StatusArg>,

    /// Case-insensitive match on id, route, or location
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Only vehicles on this route
    #[arg(long, short = 'r')]
    pub route: Option<String>,
}

impl FilterArgs {
    /// Every filter that was given, all of which must match.
    pub fn filters(&self) -> Vec<VehicleFilter> {
        let mut filters = Vec::new();
        match self.status {
            Some(StatusArg::Online) => filters.push(VehicleFilter::Online),
            Some(StatusArg::Offline) => filters.push(VehicleFilter::Offline),
            None => {}
        }
        if let Some(route) = &self.route {
            filters.push(VehicleFilter::Route(route.clone()));
        }
        if let Some(search) = &self.search {
            filters.push(VehicleFilter::Search(search.clone()));
        }
        filters
    }
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Vehicle id
    pub id: String,

    /// Lookback window in hours
    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    /// Maximum number of entries
    #[arg(long, short = 'n', default_value_t = 100)]
    pub limit: u32,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Stop after this long: seconds, or a duration such as `90s` or `5m`
    #[arg(long, short = 'd', value_parser = parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}
