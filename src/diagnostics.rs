//! Per-service health diagnostics.
//!
//! Probes a list of named sub-services through the session client and
//! reports each one independently — one failing service never drops the
//! others from the report.

use crate::config::ServiceEndpoint;
use crate::error::ApiError;
use crate::session::SessionClient;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Status of a single probed sub-service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// The service answered 2xx with a well-formed body.
    Online,
    /// Transport failure or timeout — the service is unreachable.
    Offline,
    /// The service answered, but with a non-2xx status or an unexpected body.
    Error,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of probing one sub-service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServiceCheck {
    /// Service name, unique within a report.
    pub name: String,
    pub status: ServiceStatus,
    /// Probe round-trip in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Snapshot of all probed services, in input order.
///
/// Produced fresh on each invocation, never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServiceHealthReport {
    pub services: Vec<ServiceCheck>,
    /// ISO-8601 timestamp when this report was generated.
    pub checked_at: String,
}

impl ServiceHealthReport {
    /// Status of a named service, if it was part of this report.
    pub fn status_of(&self, name: &str) -> Option<ServiceStatus> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.status)
    }

    /// `true` when every probed service is online.
    pub fn all_online(&self) -> bool {
        self.services
            .iter()
            .all(|s| s.status == ServiceStatus::Online)
    }
}

/// Probes sub-services sequentially through the session client.
///
/// Sequential on purpose: one request in flight at a time bounds the load a
/// diagnostics pass puts on an already-struggling backend, and keeps result
/// ordering deterministic.
pub struct ServiceHealthAggregator {
    client: Arc<SessionClient>,
    timeout: Duration,
}

impl ServiceHealthAggregator {
    pub fn new(client: Arc<SessionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Probe each service in order and return a fresh snapshot.
    ///
    /// A per-service failure (timeout, network error, or request rejection)
    /// is recorded for that entry and does not abort the remaining checks.
    pub async fn check_services(&self, services: &[ServiceEndpoint]) -> ServiceHealthReport {
        debug!(count = services.len(), "running service diagnostics");
        let mut results = Vec::with_capacity(services.len());

        for service in services {
            let start = std::time::Instant::now();
            let outcome = self
                .client
                .request_with_timeout(
                    reqwest::Method::GET,
                    &service.endpoint,
                    None,
                    Some(self.timeout),
                )
                .await;
            let latency_ms = start.elapsed().as_millis() as u64;

            let (status, latency) = match outcome {
                Ok(body) if body.is_object() => (ServiceStatus::Online, Some(latency_ms)),
                Ok(_) => {
                    warn!(service = %service.name, "unexpected response shape");
                    (ServiceStatus::Error, Some(latency_ms))
                }
                Err(ApiError::Network(e)) => {
                    debug!(service = %service.name, err = %e, "service unreachable");
                    (ServiceStatus::Offline, None)
                }
                Err(e) => {
                    warn!(service = %service.name, err = %e, "service check rejected");
                    (ServiceStatus::Error, Some(latency_ms))
                }
            };

            results.push(ServiceCheck {
                name: service.name.clone(),
                status,
                latency_ms: latency,
            });
        }

        ServiceHealthReport {
            services: results,
            checked_at: Utc::now().to_rfc3339(),
        }
    }
}
