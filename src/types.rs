use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

pub type NetworkId = String;

/// A sequencer network as supplied by the surrounding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    pub base_url: Url,
    /// Route privacy-sensitive endpoints through the relay network.
    #[serde(default)]
    pub relay_routing: bool,
}

impl Network {
    pub fn new(id: impl Into<NetworkId>, name: impl Into<String>, base_url: Url) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url,
            relay_routing: false,
        }
    }

    pub fn with_relay_routing(mut self, relay_routing: bool) -> Self {
        self.relay_routing = relay_routing;
        self
    }

    /// Memoization key shared by both provider families.
    pub fn cache_key(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayLifecycle {
    /// Started once and left running across calls.
    #[default]
    Ambient,
    /// Started right before and stopped right after each relay send.
    PerCall,
}

// Raw, serde-facing settings. Everything is optional so partial documents load;
// `config::resolve_config` fills in the defaults.

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub log_level: LogLevel,
    pub request_timeout_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
    pub relay: Option<RelaySettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    pub client_id: Option<String>,
    pub timeout_ms: Option<u64>,
    pub discovery_endpoint: Option<String>,
    pub debug_pattern: Option<String>,
    pub lifecycle: RelayLifecycle,
    pub routed_endpoints: Option<Vec<String>>,
}
