//! Adapter registry mapping networks to their publish implementation

use crosspost_core::models::Network;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapter::PlatformAdapter;

/// Registry for looking up the adapter of a network.
///
/// Cloning shares the underlying table. Registration normally happens once
/// at startup; lookups take a read lock.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<Network, Arc<dyn PlatformAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an adapter, replacing any previous adapter for the same network
    pub async fn register(&self, adapter: Arc<dyn PlatformAdapter>) {
        let network = adapter.network();
        let mut adapters = self.adapters.write().await;
        if adapters.insert(network, adapter).is_some() {
            tracing::warn!(network = %network, "Replaced existing platform adapter");
        }
    }

    pub async fn get(&self, network: Network) -> Option<Arc<dyn PlatformAdapter>> {
        let adapters = self.adapters.read().await;
        adapters.get(&network).cloned()
    }

    pub async fn contains(&self, network: Network) -> bool {
        let adapters = self.adapters.read().await;
        adapters.contains_key(&network)
    }

    /// Registered networks in a stable order
    pub async fn networks(&self) -> Vec<Network> {
        let adapters = self.adapters.read().await;
        let mut networks: Vec<Network> = adapters.keys().copied().collect();
        networks.sort();
        networks
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
