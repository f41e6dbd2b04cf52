//! Resilience core of the storefront web client.
//!
//! Everything presentational lives elsewhere; this crate owns the parts
//! that keep a session usable across flaky networks and backend outages:
//!
//! - [`session::SessionClient`] — bearer-auth request client with outcome
//!   classification and token lifecycle,
//! - [`token::TokenStore`] — durable persistence for the one session
//!   credential,
//! - [`diagnostics::ServiceHealthAggregator`] — per-service health probes
//!   with isolated failures,
//! - [`monitor::ConnectivityMonitor`] — backend/frontend reachability
//!   tracking with navigation-intent preservation.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;
pub mod token;

pub use config::{ClientConfig, ServiceEndpoint};
pub use error::ApiError;
pub use events::{ClientEvent, EventBroadcaster};
pub use monitor::{
    BackendStatus, ConnectivityMonitor, ConnectivityState, FrontendStatus, Navigator,
};
pub use session::{Credentials, SessionClient, TokenResponse};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};

use std::sync::Arc;

/// Shared wiring passed to every component that issues requests.
///
/// Constructed once per process with an explicit init; there is no global
/// singleton holding the token.
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<ClientConfig>,
    pub broadcaster: EventBroadcaster,
    pub session: Arc<SessionClient>,
}

impl ClientContext {
    /// Wire up the session client over a durable file-backed token store
    /// rooted at the configured data directory.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let store = Arc::new(FileTokenStore::new(&config.data_dir));
        Self::with_store(config, store)
    }

    /// Wire up with an injected token store (tests use the memory-backed one).
    pub fn with_store(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, reqwest::Error> {
        let broadcaster = EventBroadcaster::new();
        let session = Arc::new(SessionClient::new(&config, store, broadcaster.clone())?);
        Ok(Self {
            config: Arc::new(config),
            broadcaster,
            session,
        })
    }
}
