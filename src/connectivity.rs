//! Contract with the network-reachability monitor.

use async_trait::async_trait;
use tokio::sync::broadcast;

/// A reachability probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    /// Link-level connectivity (interface up, association established).
    pub is_connected: bool,
    /// Whether the wider internet was actually reachable on the last probe.
    pub is_internet_reachable: bool,
}

impl ConnectivityState {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    /// Online means both link and internet reachability. A captive portal
    /// reports `is_connected` without `is_internet_reachable` and must take
    /// the offline path.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

/// Event source for connectivity transitions.
///
/// The engine probes `current_state()` before every mutation and holds one
/// `subscribe()` receiver in its connectivity watcher task; replay fires once
/// per observed offline-to-online transition.
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    async fn current_state(&self) -> ConnectivityState;

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityState>;
}
