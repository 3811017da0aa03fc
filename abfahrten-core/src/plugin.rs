//! Registry for all backend plugins and their ports.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{ProviderId, ProviderMeta};
use crate::ports::{DeparturePort, PortError};

/// A backend implementation bundled with its metadata.
pub struct ProviderPlugin {
    /// Static metadata describing the backend.
    pub meta: ProviderMeta,
    /// Implementation fetching departures.
    pub departure_port: Arc<dyn DeparturePort>,
}

impl ProviderPlugin {
    /// Bundle a port with its own metadata.
    #[must_use]
    pub fn new(departure_port: Arc<dyn DeparturePort>) -> Self {
        Self {
            meta: departure_port.provider().clone(),
            departure_port,
        }
    }
}

/// Registry that resolves plugins by provider identifier.
pub struct ProviderRegistry {
    plugins: HashMap<ProviderId, ProviderPlugin>,
}

impl ProviderRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<ProviderPlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.meta.id.clone(), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Metadata for all registered providers, ordered by identifier.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        let mut providers = self
            .plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect::<Vec<_>>();
        providers.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        providers
    }

    /// Whether a provider is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &ProviderId) -> bool {
        self.plugins.contains_key(id)
    }

    /// Look up the plugin for a provider.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownProvider`] when no plugin is registered.
    pub fn plugin(&self, id: &ProviderId) -> Result<&ProviderPlugin, PortError> {
        self.plugins
            .get(id)
            .ok_or_else(|| PortError::UnknownProvider(id.clone()))
    }
}
