//! Typed client events broadcast to whoever is embedding the core.
//!
//! The session client and connectivity monitor never navigate or render by
//! themselves — they publish events and the UI shell decides what to do
//! (redirect to the auth entry point, show the status view, and so on).

use crate::monitor::{BackendStatus, FrontendStatus};
use tokio::sync::broadcast;

/// Events published by the resilience core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The session was forcibly invalidated (HTTP 401). The stored token is
    /// already cleared; the shell should redirect to the auth entry point.
    SessionInvalidated,
    /// The backend reachability status changed.
    BackendStatusChanged(BackendStatus),
    /// The frontend self-check status changed.
    FrontendStatusChanged(FrontendStatus),
    /// The monitor restored a previously captured route after an outage.
    RouteRestored(String),
}

/// Broadcasts [`ClientEvent`]s to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Send an event to all subscribers.
    pub fn broadcast(&self, event: ClientEvent) {
        // Ignore errors — no subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}
