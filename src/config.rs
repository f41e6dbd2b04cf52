use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_ASSET_BASE_URL: &str = "http://localhost:5173";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// ─── MonitorConfig ────────────────────────────────────────────────────────────

/// Connectivity monitor configuration (`[monitor]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between periodic backend health probes. Default: 30.
    pub probe_interval_secs: u64,
    /// Per-probe timeout in seconds; an exceeded probe counts as offline. Default: 5.
    pub probe_timeout_secs: u64,
    /// In-app path of the dedicated status view. Never captured as a stored
    /// route and never navigated to on restoration. Default: "/status".
    pub status_path: String,
    /// Static asset fetched with a HEAD request to verify the frontend
    /// server itself is reachable. Default: "/vite.svg".
    pub asset_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 30,
            probe_timeout_secs: 5,
            status_path: "/status".to_string(),
            asset_path: "/vite.svg".to_string(),
        }
    }
}

// ─── DiagnosticsConfig ────────────────────────────────────────────────────────

/// One named sub-service probed by the health aggregator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Unique service name, e.g. `"database"`.
    pub name: String,
    /// Endpoint path relative to the API base URL.
    pub endpoint: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Service diagnostics configuration (`[diagnostics]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Per-service probe timeout in seconds. Default: 5.
    pub timeout_secs: u64,
    /// Ordered list of sub-services to probe. Defaults to the storefront
    /// admin diagnostics endpoints.
    pub services: Vec<ServiceEndpoint>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            services: default_services(),
        }
    }
}

/// Default admin-style diagnostics endpoints, matching the storefront
/// dashboard's system status panel.
pub fn default_services() -> Vec<ServiceEndpoint> {
    vec![
        ServiceEndpoint::new("api", "/admin/system/status"),
        ServiceEndpoint::new("database", "/admin/dashboard/stats"),
        ServiceEndpoint::new("payments", "/admin/performance/metrics"),
        ServiceEndpoint::new("email", "/admin/marketing/stats"),
    ]
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Backend API base URL (default: http://localhost:8000).
    api_base_url: Option<String>,
    /// Frontend origin used for the static-asset self-check
    /// (default: http://localhost:5173).
    asset_base_url: Option<String>,
    /// Timeout for business requests in seconds (default: 10).
    request_timeout_secs: Option<u64>,
    /// Log level filter string, e.g. "debug", "info,storefront_client=trace".
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Connectivity monitor settings (`[monitor]`).
    monitor: Option<MonitorConfig>,
    /// Service diagnostics settings (`[diagnostics]`).
    diagnostics: Option<DiagnosticsConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── ClientConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL (STOREFRONT_API_URL env var).
    pub api_base_url: String,
    /// Frontend origin probed by the self-check (STOREFRONT_ASSET_URL env var).
    pub asset_base_url: String,
    /// Directory holding config.toml and the persisted token.
    pub data_dir: PathBuf,
    /// Log level filter (STOREFRONT_LOG env var, default: "info").
    pub log: String,
    /// Log output format: "pretty" (default) | "json" (STOREFRONT_LOG_FORMAT).
    pub log_format: String,
    /// Timeout for business requests issued by the session client.
    pub request_timeout_secs: u64,
    /// Connectivity monitor settings.
    pub monitor: MonitorConfig,
    /// Service diagnostics settings.
    pub diagnostics: DiagnosticsConfig,
}

impl ClientConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let api_base_url = std::env::var("STOREFRONT_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let asset_base_url = std::env::var("STOREFRONT_ASSET_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.asset_base_url)
            .unwrap_or_else(|| DEFAULT_ASSET_BASE_URL.to_string());

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("STOREFRONT_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let request_timeout_secs = toml
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let monitor = toml.monitor.unwrap_or_default();
        let diagnostics = toml.diagnostics.unwrap_or_default();

        Self {
            api_base_url,
            asset_base_url,
            data_dir,
            log,
            log_format,
            request_timeout_secs,
            monitor,
            diagnostics,
        }
    }

    /// Full URL of the backend health probe endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.api_base_url.trim_end_matches('/'))
    }

    /// Full URL of the static asset used by the frontend self-check.
    pub fn asset_url(&self) -> String {
        format!(
            "{}{}",
            self.asset_base_url.trim_end_matches('/'),
            self.monitor.asset_path
        )
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/storefront
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("storefront");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/storefront or ~/.local/share/storefront
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("storefront");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("storefront");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\storefront
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("storefront");
        }
    }
    // Fallback
    PathBuf::from(".storefront")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = ClientConfig::new(Some(dir.path().to_path_buf()), None);
        assert_eq!(cfg.monitor.probe_interval_secs, 30);
        assert_eq!(cfg.monitor.probe_timeout_secs, 5);
        assert_eq!(cfg.monitor.status_path, "/status");
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.diagnostics.services.len(), 4);
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
api_base_url = "https://shop.example.com/api"
request_timeout_secs = 20

[monitor]
probe_interval_secs = 10
status_path = "/offline"

[diagnostics]
timeout_secs = 3
services = [{ name = "api", endpoint = "/admin/system/status" }]
"#,
        )
        .unwrap();

        let cfg = ClientConfig::new(Some(dir.path().to_path_buf()), None);
        assert_eq!(cfg.api_base_url, "https://shop.example.com/api");
        assert_eq!(cfg.request_timeout_secs, 20);
        assert_eq!(cfg.monitor.probe_interval_secs, 10);
        assert_eq!(cfg.monitor.status_path, "/offline");
        // Unset [monitor] fields keep their defaults.
        assert_eq!(cfg.monitor.probe_timeout_secs, 5);
        assert_eq!(cfg.diagnostics.services.len(), 1);
        assert_eq!(cfg.health_url(), "https://shop.example.com/api/health");
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "not valid [ toml").unwrap();
        let cfg = ClientConfig::new(Some(dir.path().to_path_buf()), None);
        assert_eq!(cfg.monitor.probe_interval_secs, 30);
    }
}
