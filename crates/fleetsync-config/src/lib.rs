//! Configuration for fleetsync tools.
//!
//! A TOML file plus `FLEETSYNC_*` environment overrides, layered with
//! figment over built-in defaults, then translated into
//! `fleetsync_core::SyncConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use fleetsync_core::{PollIntervals, ReconnectPolicy, SyncConfig};

/// Environment prefix. Nested keys use `__`, e.g. `FLEETSYNC_POLLING__FLEET`.
pub const ENV_PREFIX: &str = "FLEETSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Backend root URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Push socket URL; derived from `api_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,

    /// Query timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Default CLI output format.
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub polling: Polling,

    #[serde(default)]
    pub reconnect: Reconnect,

    /// Drop vehicles missing from the fleet listing after this many
    /// seconds of silence. Unset keeps them, marked offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_absent_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            push_url: None,
            timeout: default_timeout(),
            output: default_output(),
            polling: Polling::default(),
            reconnect: Reconnect::default(),
            retain_absent_secs: None,
        }
    }
}

/// Poll intervals, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Polling {
    #[serde(default = "default_fleet_secs")]
    pub fleet: u64,
    #[serde(default = "default_overview_secs")]
    pub overview: u64,
    #[serde(default = "default_statistics_secs")]
    pub statistics: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            fleet: default_fleet_secs(),
            overview: default_overview_secs(),
            statistics: default_statistics_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reconnect {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_output() -> String {
    "table".into()
}
fn default_fleet_secs() -> u64 {
    5
}
fn default_overview_secs() -> u64 {
    10
}
fn default_statistics_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    5
}
fn default_delay_ms() -> u64 {
    1000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleetsync", "fleetsync").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fleetsync");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then `path` if it exists, then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load from the platform config path. A missing file is not an error.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(&config_path())
}

/// Load from an explicit file, which must exist.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    load_from(path)
}

fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation and conversion ───────────────────────────────────────

impl Config {
    /// Check every field the runtime depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        self.push_url()?;
        if self.timeout == 0 {
            return Err(invalid("timeout", "must be greater than zero"));
        }
        for (field, secs) in [
            ("polling.fleet", self.polling.fleet),
            ("polling.overview", self.polling.overview),
            ("polling.statistics", self.polling.statistics),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.reconnect.max_attempts == 0 {
            return Err(invalid("reconnect.max_attempts", "must be at least 1"));
        }
        if !matches!(
            self.output.as_str(),
            "table" | "json" | "json-compact" | "yaml" | "plain"
        ) {
            return Err(invalid(
                "output",
                format!(
                    "expected table, json, json-compact, yaml, or plain, got '{}'",
                    self.output
                ),
            ));
        }
        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        parse_url("api_url", &self.api_url, &["http", "https"])
    }

    pub fn push_url(&self) -> Result<Option<Url>, ConfigError> {
        self.push_url
            .as_deref()
            .map(|raw| parse_url("push_url", raw, &["ws", "wss"]))
            .transpose()
    }

    /// Runtime settings for `FleetSync`.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        self.validate()?;
        let mut sync = SyncConfig::new(self.api_url()?);
        sync.push_url = self.push_url()?;
        sync.query_timeout = Duration::from_secs(self.timeout);
        sync.intervals = PollIntervals {
            fleet: Duration::from_secs(self.polling.fleet),
            overview: Duration::from_secs(self.polling.overview),
            statistics: Duration::from_secs(self.polling.statistics),
        };
        sync.reconnect = ReconnectPolicy {
            max_attempts: self.reconnect.max_attempts,
            delay: Duration::from_millis(self.reconnect.delay_ms),
        };
        sync.retain_absent_for = self.retain_absent_secs.map(Duration::from_secs);
        Ok(sync)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(field, format!("{raw}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(
            field,
            format!("unsupported scheme '{}' in {raw}", url.scheme()),
        ));
    }
    Ok(url)
}
