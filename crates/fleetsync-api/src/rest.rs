// Fleet backend HTTP client
//
// Wraps `reqwest::Client` with URL construction under `/api/fleet/`,
// status handling, and body decoding. Each endpoint is a thin inherent
// method returning the decoded wire model.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    BusListResponse, BusPayload, HealthResponse, HistoryResponse, OverviewResponse,
    RoutesResponse, StatisticsResponse,
};
use crate::transport::{self, TransportConfig};

/// Default lookback window for history queries, in hours.
pub const DEFAULT_HISTORY_HOURS: u32 = 24;
/// Default maximum number of history entries.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Raw HTTP client for the fleet backend's query interface.
#[derive(Debug, Clone)]
pub struct FleetClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl FleetClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root, e.g. `http://localhost:5000`. A
    /// path prefix such as `https://gw.example.com/fleet` is kept.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: transport::base_url(&base_url),
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = transport::base_url(&Url::parse(base_url)?);
        Ok(Self {
            http,
            base_url,
            timeout_secs: 0,
        })
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/fleet/overview`
    pub async fn overview(&self) -> Result<OverviewResponse, Error> {
        let url = self.fleet_url("overview")?;
        self.get(url).await
    }

    /// `GET /api/fleet/buses`
    pub async fn list_buses(&self) -> Result<BusListResponse, Error> {
        let url = self.fleet_url("buses")?;
        self.get(url).await
    }

    /// `GET /api/fleet/buses/{id}`
    ///
    /// A 404 is not an error: it means the vehicle does not exist.
    pub async fn get_bus(&self, vehicle_id: &str) -> Result<Option<BusPayload>, Error> {
        let url = self.bus_url(vehicle_id, None)?;
        match self.get(url).await {
            Ok(bus) => Ok(Some(bus)),
            Err(e) if e.is_not_found() => {
                debug!(vehicle_id, "vehicle not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// `GET /api/fleet/buses/{id}/history?hours=&limit=`
    pub async fn bus_history(
        &self,
        vehicle_id: &str,
        hours: u32,
        limit: u32,
    ) -> Result<HistoryResponse, Error> {
        let mut url = self.bus_url(vehicle_id, Some("history"))?;
        url.query_pairs_mut()
            .append_pair("hours", &hours.to_string())
            .append_pair("limit", &limit.to_string());
        self.get(url).await
    }

    /// `GET /api/fleet/map-data`
    pub async fn map_data(&self) -> Result<BusListResponse, Error> {
        let url = self.fleet_url("map-data")?;
        self.get(url).await
    }

    /// `GET /api/fleet/routes`
    pub async fn routes(&self) -> Result<RoutesResponse, Error> {
        let url = self.fleet_url("routes")?;
        self.get(url).await
    }

    /// `GET /api/fleet/statistics`
    pub async fn statistics(&self) -> Result<StatisticsResponse, Error> {
        let url = self.fleet_url("statistics")?;
        self.get(url).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, Error> {
        let url = self.base_url.join("health")?;
        self.get(url).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn fleet_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("api/fleet/{path}"))?)
    }

    /// `{base}/api/fleet/buses/{id}[/{suffix}]`, with the id percent-encoded.
    fn bus_url(&self, vehicle_id: &str, suffix: Option<&str>) -> Result<Url, Error> {
        let mut url = self.fleet_url("buses")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.push(vehicle_id);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Pull `{"error": "..."}` out of an error body if the backend sent one.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}
