// ── Synchronization context ──
//
// Wires the query client, push channel, pollers, dispatcher, and store
// into one explicitly owned object. The owning process decides when it
// starts and stops; nothing here runs at construction time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use fleetsync_api::rest::{DEFAULT_HISTORY_HOURS, DEFAULT_HISTORY_LIMIT};
use fleetsync_api::{FleetClient, PushConnector, TransportConfig, WebSocketConnector};

use crate::channel::{ChannelState, PushChannel};
use crate::config::SyncConfig;
use crate::convert;
use crate::dispatch::{ChannelDispatcher, ChannelEvent, EventKind, HandlerResult, Subscription};
use crate::error::CoreError;
use crate::model::{
    FleetOverview, FleetStatistics, HealthStatus, HistoryRecord, RouteSummary, VehicleRecord,
};
use crate::poller::{PollState, PollerHandle, SnapshotPoller};
use crate::store::{FleetStore, SnapshotOutcome};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Owns one store, fed by a fleet-listing
/// poller and the push channel's `update` events, plus cached aggregate
/// numbers refreshed by their own pollers. Dropping the last clone does
/// what `shutdown()` does.
pub struct FleetSync<C: PushConnector = WebSocketConnector> {
    inner: Arc<SyncInner<C>>,
}

impl<C: PushConnector> Clone for FleetSync<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SyncInner<C: PushConnector> {
    config: SyncConfig,
    client: FleetClient,
    store: Arc<FleetStore>,
    channel: PushChannel<C>,
    overview: Arc<watch::Sender<Option<FleetOverview>>>,
    statistics: Arc<watch::Sender<Option<FleetStatistics>>>,
    running: Mutex<Option<Running>>,
}

impl<C: PushConnector> SyncInner<C> {
    fn stop(&self, running: Running) {
        running.fleet.stop();
        running.overview.stop();
        running.statistics.stop();
        self.channel.disconnect();
        running.store_feed.unsubscribe();
    }
}

// Poll tasks hold only the pieces they write to, never `SyncInner`, so
// dropping the last `FleetSync` lands here even without `shutdown()`.
impl<C: PushConnector> Drop for SyncInner<C> {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            self.stop(running);
            debug!("fleet sync dropped while running; stopped");
        }
    }
}

/// Everything `start()` created and `shutdown()` must undo.
struct Running {
    store_feed: Subscription,
    fleet: PollerHandle,
    overview: PollerHandle,
    statistics: PollerHandle,
}

impl FleetSync<WebSocketConnector> {
    /// Build a context that talks to a real backend. Does not connect.
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let connector =
            WebSocketConnector::new(config.push_url()?).with_connect_timeout(config.query_timeout);
        Self::with_connector(config, connector)
    }
}

impl<C: PushConnector> FleetSync<C> {
    /// Build a context with a custom push connector.
    pub fn with_connector(config: SyncConfig, connector: C) -> Result<Self, CoreError> {
        config.validate()?;

        let transport = TransportConfig::with_timeout(config.query_timeout);
        let client = FleetClient::new(config.api_url.clone(), &transport)?;
        let store = Arc::new(FleetStore::with_retention(config.retain_absent_for));
        let channel = PushChannel::new(connector, config.reconnect, ChannelDispatcher::new());
        let overview = Arc::new(watch::channel(None).0);
        let statistics = Arc::new(watch::channel(None).0);

        Ok(Self {
            inner: Arc::new(SyncInner {
                config,
                client,
                store,
                channel,
                overview,
                statistics,
                running: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &FleetClient {
        &self.inner.client
    }

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.inner.store
    }

    pub fn dispatcher(&self) -> &ChannelDispatcher {
        self.inner.channel.dispatcher()
    }

    pub fn channel(&self) -> &PushChannel<C> {
        &self.inner.channel
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Begin synchronizing: route push updates into the store, connect
    /// the push channel, and start the pollers. Calling it again while
    /// running does nothing. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        let mut running = lock(&self.inner.running);
        if running.is_some() {
            debug!("fleet sync already running");
            return;
        }

        let store = Arc::clone(&self.inner.store);
        let store_feed = self
            .dispatcher()
            .subscribe(EventKind::Update, move |event| -> HandlerResult {
                if let ChannelEvent::Update(fragment) = event {
                    store.apply_partial_update(fragment)?;
                }
                Ok(())
            });

        self.inner.channel.connect();

        let intervals = self.inner.config.intervals;
        let timeout = self.inner.config.query_timeout;

        let fleet = {
            let client = self.inner.client.clone();
            let store = Arc::clone(&self.inner.store);
            SnapshotPoller::new("fleet", intervals.fleet)
                .with_timeout(timeout)
                .start(
                    move || {
                        let client = client.clone();
                        async move {
                            let listing = client.list_buses().await?;
                            Ok(convert::snapshot_records(listing.buses, Utc::now()))
                        }
                    },
                    move |records| {
                        store.apply_snapshot(records);
                    },
                )
        };

        let overview = {
            let client = self.inner.client.clone();
            let cache = Arc::clone(&self.inner.overview);
            SnapshotPoller::new("overview", intervals.overview)
                .with_timeout(timeout)
                .start(
                    move || {
                        let client = client.clone();
                        async move { Ok(FleetOverview::from(client.overview().await?)) }
                    },
                    move |overview| {
                        cache.send_replace(Some(overview));
                    },
                )
        };

        let statistics = {
            let client = self.inner.client.clone();
            let cache = Arc::clone(&self.inner.statistics);
            SnapshotPoller::new("statistics", intervals.statistics)
                .with_timeout(timeout)
                .start(
                    move || {
                        let client = client.clone();
                        async move { Ok(FleetStatistics::from(client.statistics().await?)) }
                    },
                    move |stats| {
                        cache.send_replace(Some(stats));
                    },
                )
        };

        *running = Some(Running {
            store_feed,
            fleet,
            overview,
            statistics,
        });
        info!(api = %self.inner.config.api_url, "fleet sync started");
    }

    /// Stop everything `start()` began. Safe to call when not running.
    pub fn shutdown(&self) {
        let Some(running) = lock(&self.inner.running).take() else {
            return;
        };

        self.inner.stop(running);
        info!("fleet sync stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.running).is_some()
    }

    /// Poll every query now rather than waiting for its next tick.
    pub fn refresh_now(&self) {
        if let Some(running) = lock(&self.inner.running).as_ref() {
            running.fleet.refresh_now();
            running.overview.refresh_now();
            running.statistics.refresh_now();
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel.subscribe_state()
    }

    /// Latest overview from the poller, if one has arrived.
    pub fn overview(&self) -> Option<FleetOverview> {
        self.inner.overview.borrow().clone()
    }

    pub fn subscribe_overview(&self) -> watch::Receiver<Option<FleetOverview>> {
        self.inner.overview.subscribe()
    }

    /// Latest statistics from the poller, if any have arrived.
    pub fn statistics(&self) -> Option<FleetStatistics> {
        self.inner.statistics.borrow().clone()
    }

    pub fn subscribe_statistics(&self) -> watch::Receiver<Option<FleetStatistics>> {
        self.inner.statistics.subscribe()
    }

    pub fn fleet_poll_state(&self) -> PollState {
        self.poll_state(|r| &r.fleet)
    }

    pub fn overview_poll_state(&self) -> PollState {
        self.poll_state(|r| &r.overview)
    }

    pub fn statistics_poll_state(&self) -> PollState {
        self.poll_state(|r| &r.statistics)
    }

    fn poll_state(&self, pick: impl Fn(&Running) -> &PollerHandle) -> PollState {
        lock(&self.inner.running)
            .as_ref()
            .map_or_else(PollState::default, |r| pick(r).state())
    }

    // ── On-demand queries ────────────────────────────────────────────

    /// Fetch the fleet listing once and apply it to the store, without
    /// starting anything.
    pub async fn load_fleet(&self) -> Result<SnapshotOutcome, CoreError> {
        let listing = self.inner.client.list_buses().await?;
        Ok(self
            .inner
            .store
            .apply_snapshot(convert::snapshot_records(listing.buses, Utc::now())))
    }

    /// Fetch one vehicle. `Ok(None)` means the backend does not know it.
    pub async fn vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleRecord>, CoreError> {
        let Some(mut payload) = self.inner.client.get_bus(vehicle_id).await? else {
            return Ok(None);
        };
        payload
            .vehicle_id
            .get_or_insert_with(|| vehicle_id.to_owned());
        Ok(Some(convert::snapshot_record(payload, Utc::now())?))
    }

    /// Telemetry history, newest first.
    pub async fn vehicle_history(
        &self,
        vehicle_id: &str,
        hours: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryRecord>, CoreError> {
        let response = self
            .inner
            .client
            .bus_history(
                vehicle_id,
                hours.unwrap_or(DEFAULT_HISTORY_HOURS),
                limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            )
            .await?;
        Ok(response.history.into_iter().map(HistoryRecord::from).collect())
    }

    /// Vehicles with known coordinates, straight from the backend.
    pub async fn map_data(&self) -> Result<Vec<VehicleRecord>, CoreError> {
        let response = self.inner.client.map_data().await?;
        Ok(convert::snapshot_records(response.buses, Utc::now())
            .into_iter()
            .filter(|r| r.coordinates().is_some())
            .collect())
    }

    pub async fn routes(&self) -> Result<Vec<RouteSummary>, CoreError> {
        let response = self.inner.client.routes().await?;
        Ok(response.routes.into_iter().map(RouteSummary::from).collect())
    }

    pub async fn health(&self) -> Result<HealthStatus, CoreError> {
        Ok(HealthStatus::from(self.inner.client.health().await?))
    }

    /// Fetch the overview now, updating the cached copy.
    pub async fn fetch_overview(&self) -> Result<FleetOverview, CoreError> {
        let overview = FleetOverview::from(self.inner.client.overview().await?);
        self.inner.overview.send_replace(Some(overview.clone()));
        Ok(overview)
    }

    /// Fetch statistics now, updating the cached copy.
    pub async fn fetch_statistics(&self) -> Result<FleetStatistics, CoreError> {
        let stats = FleetStatistics::from(self.inner.client.statistics().await?);
        self.inner.statistics.send_replace(Some(stats.clone()));
        Ok(stats)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
