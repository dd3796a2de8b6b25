// ── Runtime synchronization configuration ──
//
// Describes *where* the backend lives and *how often* to talk to it.
// Never touches disk: `fleetsync-config` (or a test) builds a
// `SyncConfig` and hands it to `FleetSync`.

use std::time::Duration;

use url::Url;

use fleetsync_api::ReconnectPolicy;
use fleetsync_api::transport::DEFAULT_QUERY_TIMEOUT;

use crate::error::CoreError;

/// Refresh cadence for each polled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Fleet listing, applied to the store as a snapshot.
    pub fleet: Duration,
    /// Aggregate overview numbers.
    pub overview: Duration,
    /// Speed distribution.
    pub statistics: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            fleet: Duration::from_secs(5),
            overview: Duration::from_secs(10),
            statistics: Duration::from_secs(30),
        }
    }
}

/// Everything `FleetSync` needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Backend root, e.g. `http://localhost:5000`.
    pub api_url: Url,
    /// Push socket URL. Derived from `api_url` when `None`.
    pub push_url: Option<Url>,
    /// Upper bound on any single query, including the connect handshake.
    pub query_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub intervals: PollIntervals,
    /// Evict vehicles missing from a snapshot once they have been silent
    /// this long. `None` keeps them, marked offline.
    pub retain_absent_for: Option<Duration>,
}

impl SyncConfig {
    /// Defaults for everything but the backend location.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            push_url: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            intervals: PollIntervals::default(),
            retain_absent_for: None,
        }
    }

    /// The push socket URL, explicit or derived.
    pub fn push_url(&self) -> Result<Url, CoreError> {
        match &self.push_url {
            Some(url) => Ok(url.clone()),
            None => Ok(fleetsync_api::websocket::push_url_from(&self.api_url)?),
        }
    }

    /// Reject settings the runtime cannot honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        let zero = |name: &str| CoreError::Config {
            message: format!("{name} must be greater than zero"),
        };
        if self.query_timeout.is_zero() {
            return Err(zero("query_timeout"));
        }
        if self.intervals.fleet.is_zero() {
            return Err(zero("intervals.fleet"));
        }
        if self.intervals.overview.is_zero() {
            return Err(zero("intervals.overview"));
        }
        if self.intervals.statistics.is_zero() {
            return Err(zero("intervals.statistics"));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(zero("reconnect.max_attempts"));
        }
        Ok(())
    }
}
