use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::types::{LogLevel, ProviderSettings, RelayLifecycle, RelaySettings};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 200_000;
pub const DEFAULT_RELAY_CLIENT_ID: &str = "trial";
pub const DEFAULT_DISCOVERY_ENDPOINT: &str = "https://staging.discovery.rpch.tech";
pub const DEFAULT_RELAY_ROUTED_ENDPOINTS: &[&str] = &["add_transaction"];

#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    /// Level of the per-call summary event
    pub log_level: LogLevel,
    /// Timeout for direct HTTP calls
    pub request_timeout: Duration,
    /// Headers sent with every request; merged over `Content-Type` on POST
    pub headers: BTreeMap<String, String>,
    /// Relay settings, applied only to networks with relay routing enabled
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Client identifier presented to the relay network
    pub client_id: String,
    /// Upper bound for a single relay send
    pub timeout: Duration,
    /// Discovery service the relay SDK bootstraps from
    pub discovery_endpoint: Url,
    /// SDK debug namespace pattern, e.g. `rpch:*`; `None` keeps it quiet
    pub debug_pattern: Option<String>,
    pub lifecycle: RelayLifecycle,
    /// Endpoints delivered through the relay instead of direct HTTP
    pub routed_endpoints: Vec<String>,
}

pub fn resolve_config(settings: ProviderSettings) -> Result<NormalizedConfig, ConfigError> {
    let relay = settings.relay.unwrap_or_default();

    Ok(NormalizedConfig {
        log_level: settings.log_level,
        request_timeout: Duration::from_millis(
            settings
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        ),
        headers: settings.headers,
        relay: resolve_relay(relay)?,
    })
}

fn resolve_relay(relay: RelaySettings) -> Result<RelayConfig, ConfigError> {
    let discovery = relay
        .discovery_endpoint
        .unwrap_or_else(|| DEFAULT_DISCOVERY_ENDPOINT.to_string());
    let discovery_endpoint = Url::parse(&discovery).map_err(|e| ConfigError::InvalidUrl {
        url: discovery.clone(),
        reason: e.to_string(),
    })?;

    Ok(RelayConfig {
        client_id: relay
            .client_id
            .unwrap_or_else(|| DEFAULT_RELAY_CLIENT_ID.to_string()),
        timeout: Duration::from_millis(relay.timeout_ms.unwrap_or(DEFAULT_RELAY_TIMEOUT_MS)),
        discovery_endpoint,
        debug_pattern: relay.debug_pattern,
        lifecycle: relay.lifecycle,
        routed_endpoints: relay.routed_endpoints.unwrap_or_else(|| {
            DEFAULT_RELAY_ROUTED_ENDPOINTS
                .iter()
                .map(|e| e.to_string())
                .collect()
        }),
    })
}
