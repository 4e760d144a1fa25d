//! Memoized provider construction.
//!
//! Create one [`ProviderRegistry`] at startup and share it. Providers are built
//! on the first lookup for a base URL and live as long as the registry; call
//! [`ProviderRegistry::shutdown`] at process teardown to stop relay sessions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;

use crate::config::{resolve_config, NormalizedConfig};
use crate::error::ConfigError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::provider::{LegacyProvider, SequencerProvider};
use crate::relay::{CryptoHandle, KeyValueStore, MemoryStore, RelaySdkFactory, RelaySession};
use crate::router::TransportRouter;
use crate::types::{Network, ProviderSettings};

#[derive(Clone)]
struct RelayBackend {
    factory: Arc<dyn RelaySdkFactory>,
    crypto: CryptoHandle,
}

pub struct ProviderRegistry {
    config: NormalizedConfig,
    http: Arc<dyn HttpTransport>,
    store: Arc<dyn KeyValueStore>,
    relay: Option<RelayBackend>,
    providers: DashMap<String, Arc<SequencerProvider>>,
    legacy_providers: DashMap<String, Arc<LegacyProvider>>,
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    settings: ProviderSettings,
    http: Option<Arc<dyn HttpTransport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    relay: Option<RelayBackend>,
}

impl ProviderRegistryBuilder {
    pub fn settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn http_transport(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    /// Backing store shared by every relay session this registry creates.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn relay_sdk(mut self, factory: Arc<dyn RelaySdkFactory>, crypto: CryptoHandle) -> Self {
        self.relay = Some(RelayBackend { factory, crypto });
        self
    }

    pub fn build(self) -> Result<ProviderRegistry, ConfigError> {
        let config = resolve_config(self.settings)?;
        let http = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestTransport::new(config.request_timeout)?),
        };

        Ok(ProviderRegistry {
            config,
            http,
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            relay: self.relay,
            providers: DashMap::new(),
            legacy_providers: DashMap::new(),
        })
    }
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn config(&self) -> &NormalizedConfig {
        &self.config
    }

    /// Returns the privacy-capable provider for `network`, building it on first use.
    ///
    /// The provider is built outside the map's locks, so a relay SDK factory may
    /// look things up in this registry. Two racing first lookups each build one;
    /// the loser's provider is dropped unused.
    pub fn get_provider(&self, network: &Network) -> Result<Arc<SequencerProvider>, ConfigError> {
        let key = network.cache_key();
        if let Some(existing) = self.providers.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        let built = Arc::new(self.build_provider(network, &key)?);
        match self.providers.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                tracing::info!(
                    network = %network.id,
                    base_url = %entry.key(),
                    relay = built.relay_session().is_some(),
                    "created sequencer provider"
                );
                entry.insert(Arc::clone(&built));
                Ok(built)
            }
        }
    }

    /// Returns the legacy-generation provider for `network`, building it on first use.
    pub fn get_legacy_provider(&self, network: &Network) -> Arc<LegacyProvider> {
        let provider = self
            .legacy_providers
            .entry(network.cache_key())
            .or_insert_with(|| {
                tracing::info!(network = %network.id, "created legacy sequencer provider");
                let router = TransportRouter::new(
                    &network.base_url,
                    &self.config,
                    Arc::clone(&self.http),
                    None,
                );
                Arc::new(LegacyProvider::new(network.base_url.clone(), router))
            });
        Arc::clone(provider.value())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn legacy_provider_count(&self) -> usize {
        self.legacy_providers.len()
    }

    /// Stops every relay session created through this registry.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<RelaySession>> = self
            .providers
            .iter()
            .filter_map(|entry| entry.value().relay_session().cloned())
            .collect();

        let results = join_all(sessions.iter().map(|session| session.stop())).await;
        for result in results {
            if let Err(e) = result {
                tracing::warn!(error = %e, "relay session failed to stop during shutdown");
            }
        }
    }

    fn build_provider(
        &self,
        network: &Network,
        namespace: &str,
    ) -> Result<SequencerProvider, ConfigError> {
        let relay = if network.relay_routing {
            let backend = self.relay.as_ref().ok_or_else(|| ConfigError::MissingRelaySdk {
                network_id: network.id.clone(),
            })?;
            let session = RelaySession::new(
                backend.factory.as_ref(),
                backend.crypto.clone(),
                &self.config.relay,
                Arc::clone(&self.store),
                namespace,
            )
            .map_err(|e| ConfigError::RelaySdk(format!("{e:#}")))?;
            Some(Arc::new(session))
        } else {
            None
        };

        let router = TransportRouter::new(&network.base_url, &self.config, Arc::clone(&self.http), relay);
        Ok(SequencerProvider::new(
            network.id.clone(),
            network.base_url.clone(),
            router,
        ))
    }
}
