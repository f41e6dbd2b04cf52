//! Backend/frontend connectivity monitor.
//!
//! Probes the backend health endpoint every 30 seconds and the frontend's
//! own static assets on demand, maintaining a shared status snapshot the UI
//! shell renders from. When the backend drops out mid-session the current
//! route is captured, and restored with exactly one navigation once the
//! backend comes back.
//!
//! The monitor is an explicit long-lived task: `start` spawns the timer,
//! `stop` cancels it and detaches the state from any probe still in flight.

use crate::config::ClientConfig;
use crate::events::{ClientEvent, EventBroadcaster};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ─── Status types ─────────────────────────────────────────────────────────────

/// Backend reachability as seen by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    /// No probe has completed yet.
    Checking,
    Online,
    Offline,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "checking"),
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Frontend server reachability (static-asset self-check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontendStatus {
    Online,
    Offline,
}

impl std::fmt::Display for FrontendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Snapshot of connectivity state, updated only by the monitor.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectivityState {
    pub backend: BackendStatus,
    pub frontend: FrontendStatus,
    /// When the backend probe last ran, successful or not.
    pub last_checked: Option<DateTime<Utc>>,
    /// Route captured when the backend went offline, pending restoration.
    pub stored_route: Option<String>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            backend: BackendStatus::Checking,
            frontend: FrontendStatus::Online,
            last_checked: None,
            stored_route: None,
        }
    }
}

/// Shared connectivity state updated by the monitor task.
pub type SharedState = Arc<RwLock<ConnectivityState>>;

// ─── Navigator ────────────────────────────────────────────────────────────────

/// The navigation surface the monitor reads and drives.
///
/// Reading happens when the backend drops offline (to capture the route the
/// user was on); writing happens once when it comes back. The monitor never
/// navigates anywhere else.
pub trait Navigator: Send + Sync {
    /// The current in-app path, e.g. `"/cart"`.
    fn current_path(&self) -> String;
    /// Navigate to an in-app path.
    fn navigate(&self, path: &str);
}

// ─── ConnectivityMonitor ──────────────────────────────────────────────────────

/// Cheap-to-clone handle to the monitor; all clones share one state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    health_url: String,
    asset_url: String,
    status_path: String,
    probe_interval: Duration,
    state: SharedState,
    navigator: Arc<dyn Navigator>,
    broadcaster: EventBroadcaster,
    /// False after `stop` — in-flight probe results are discarded.
    active: AtomicBool,
    /// At most one probe in flight per target; late triggers are skipped.
    backend_in_flight: AtomicBool,
    frontend_in_flight: AtomicBool,
    /// Environment-level connectivity. While false the frontend status is
    /// forced offline regardless of the asset probe.
    network_available: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
        broadcaster: EventBroadcaster,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.monitor.probe_timeout_secs))
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                health_url: config.health_url(),
                asset_url: config.asset_url(),
                status_path: config.monitor.status_path.clone(),
                probe_interval: Duration::from_secs(config.monitor.probe_interval_secs),
                state: Arc::new(RwLock::new(ConnectivityState::default())),
                navigator,
                broadcaster,
                active: AtomicBool::new(true),
                backend_in_flight: AtomicBool::new(false),
                frontend_in_flight: AtomicBool::new(false),
                network_available: AtomicBool::new(true),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Handle to the shared state snapshot.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.inner.state)
    }

    /// Current state by value.
    pub async fn snapshot(&self) -> ConnectivityState {
        self.inner.state.read().await.clone()
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────

    /// Start the periodic probe loop. The first tick fires immediately and
    /// also runs the frontend self-check. Calling `start` again while the
    /// timer is running is a no-op; `stop` is terminal.
    pub fn start(&self) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        let mut timer = match self.inner.timer.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if timer.is_some() {
            return;
        }
        info!(url = %self.inner.health_url,
            interval_secs = self.inner.probe_interval.as_secs(),
            "connectivity monitor started");

        let monitor = self.clone();
        *timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.inner.probe_interval);
            let mut first = true;
            loop {
                interval.tick().await;
                if !monitor.inner.active.load(Ordering::SeqCst) {
                    break;
                }
                monitor.probe_backend().await;
                if first {
                    monitor.probe_frontend().await;
                    first = false;
                }
            }
        }));
    }

    /// Stop the timer. A probe already in flight completes but its result
    /// is discarded rather than applied.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut timer) = self.inner.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        info!("connectivity monitor stopped");
    }

    // ─── Triggers ─────────────────────────────────────────────────────────

    /// Manual retry: re-run both probes on demand.
    pub async fn retry_checks(&self) {
        self.probe_backend().await;
        self.probe_frontend().await;
    }

    /// Environment regained connectivity: probe both targets immediately.
    pub async fn handle_connectivity_regained(&self) {
        self.inner.network_available.store(true, Ordering::SeqCst);
        debug!("network connectivity regained — reprobing");
        self.retry_checks().await;
    }

    /// Environment lost connectivity: force both statuses offline without
    /// waiting for a probe to time out.
    pub async fn handle_connectivity_lost(&self) {
        self.inner.network_available.store(false, Ordering::SeqCst);
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        warn!("network connectivity lost — forcing offline");
        self.apply_backend_status(BackendStatus::Offline, false).await;
        self.apply_frontend_status(FrontendStatus::Offline).await;
    }

    // ─── Backend probe ────────────────────────────────────────────────────

    /// One bounded probe of `{base}/health`. Skipped when a backend probe
    /// is already outstanding; its result is discarded after `stop`.
    async fn probe_backend(&self) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        if self
            .inner
            .backend_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("backend probe already in flight — skipping");
            return;
        }

        let status = self.fetch_backend_status().await;
        self.inner.backend_in_flight.store(false, Ordering::SeqCst);

        if !self.inner.active.load(Ordering::SeqCst) {
            debug!("monitor stopped — discarding probe result");
            return;
        }
        self.apply_backend_status(status, true).await;
    }

    /// Online iff HTTP 200 and the body's health flag says healthy. Any
    /// other outcome — non-200, malformed body, network error, timeout —
    /// is offline. There is no intermediate "degraded" state.
    async fn fetch_backend_status(&self) -> BackendStatus {
        let resp = self
            .inner
            .http
            .get(&self.inner.health_url)
            .header("Cache-Control", "no-cache")
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                match resp.json::<serde_json::Value>().await {
                    Ok(body) if body.get("status").and_then(|s| s.as_str()) == Some("healthy") => {
                        BackendStatus::Online
                    }
                    Ok(_) => {
                        debug!("health body not healthy");
                        BackendStatus::Offline
                    }
                    Err(e) => {
                        debug!(err = %e, "health body unparsable");
                        BackendStatus::Offline
                    }
                }
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "health probe non-200");
                BackendStatus::Offline
            }
            Err(e) => {
                debug!(err = %e, "health probe failed");
                BackendStatus::Offline
            }
        }
    }

    /// Apply a backend status observation, running the stored-route state
    /// machine. `stamp` is true for real probe attempts ("last checked"),
    /// false for the forced offline on a connectivity-lost event.
    async fn apply_backend_status(&self, new_status: BackendStatus, stamp: bool) {
        let mut restored: Option<String> = None;
        {
            let mut state = self.inner.state.write().await;
            let previous = state.backend;
            if stamp {
                state.last_checked = Some(Utc::now());
            }

            if previous == BackendStatus::Online && new_status == BackendStatus::Offline {
                // Capture where the user was, unless already on the status view.
                let path = self.inner.navigator.current_path();
                if path != self.inner.status_path {
                    info!(%path, "backend went offline — storing route");
                    state.stored_route = Some(path);
                }
            }

            if previous == BackendStatus::Offline && new_status == BackendStatus::Online {
                // Cleared exactly once per offline→online transition.
                if let Some(route) = state.stored_route.take() {
                    if route != self.inner.status_path {
                        restored = Some(route);
                    }
                }
            }

            state.backend = new_status;
            if previous != new_status {
                match new_status {
                    BackendStatus::Online => info!("backend online"),
                    BackendStatus::Offline => warn!("backend offline"),
                    BackendStatus::Checking => {}
                }
                self.inner
                    .broadcaster
                    .broadcast(ClientEvent::BackendStatusChanged(new_status));
            }
        }

        // Navigate outside the state lock.
        if let Some(route) = restored {
            info!(path = %route, "backend restored — navigating back");
            self.inner.navigator.navigate(&route);
            self.inner
                .broadcaster
                .broadcast(ClientEvent::RouteRestored(route));
        }
    }

    // ─── Frontend probe ───────────────────────────────────────────────────

    /// Self-check: HEAD a known static asset. Forced offline while the
    /// environment reports no network connectivity.
    async fn probe_frontend(&self) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        if self
            .inner
            .frontend_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("frontend probe already in flight — skipping");
            return;
        }

        let status = if !self.inner.network_available.load(Ordering::SeqCst) {
            FrontendStatus::Offline
        } else {
            let resp = self
                .inner
                .http
                .head(&self.inner.asset_url)
                .header("Cache-Control", "no-cache")
                .send()
                .await;
            match resp {
                Ok(resp) if resp.status().is_success() => FrontendStatus::Online,
                Ok(resp) => {
                    debug!(status = %resp.status(), "asset probe non-2xx");
                    FrontendStatus::Offline
                }
                Err(e) => {
                    debug!(err = %e, "asset probe failed");
                    FrontendStatus::Offline
                }
            }
        };
        self.inner.frontend_in_flight.store(false, Ordering::SeqCst);

        if !self.inner.active.load(Ordering::SeqCst) {
            debug!("monitor stopped — discarding probe result");
            return;
        }
        self.apply_frontend_status(status).await;
    }

    async fn apply_frontend_status(&self, new_status: FrontendStatus) {
        let mut state = self.inner.state.write().await;
        if state.frontend != new_status {
            match new_status {
                FrontendStatus::Online => info!("frontend online"),
                FrontendStatus::Offline => warn!("frontend offline"),
            }
            state.frontend = new_status;
            self.inner
                .broadcaster
                .broadcast(ClientEvent::FrontendStatusChanged(new_status));
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}
