//! Maps a sequencer endpoint name to its base URL family and HTTP verb.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Which of the two sequencer URL families an endpoint lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    Gateway,
    FeederGateway,
}

impl BaseKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::FeederGateway => "feeder_gateway",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointClass {
    pub base: BaseKind,
    pub method: HttpMethod,
}

/// Endpoints that write state or run computation; sent as POST to the gateway.
pub const POST_ENDPOINTS: &[&str] = &[
    "add_transaction",
    "call_contract",
    "estimate_fee",
    "estimate_fee_bulk",
    "estimate_message_fee",
    "simulate_transaction",
];

const GATEWAY_ENDPOINTS: &[&str] = &["add_transaction"];

pub const KNOWN_ENDPOINTS: &[&str] = &[
    "add_transaction",
    "call_contract",
    "estimate_fee",
    "estimate_fee_bulk",
    "estimate_message_fee",
    "simulate_transaction",
    "get_block",
    "get_block_traces",
    "get_class_by_hash",
    "get_class_hash_at",
    "get_code",
    "get_compiled_class_by_class_hash",
    "get_contract_addresses",
    "get_full_contract",
    "get_nonce",
    "get_state_update",
    "get_storage_at",
    "get_transaction",
    "get_transaction_receipt",
    "get_transaction_status",
    "get_transaction_trace",
];

pub fn is_known(endpoint: &str) -> bool {
    KNOWN_ENDPOINTS.contains(&endpoint)
}

/// Unknown names are not an error: they fall through to a feeder-gateway GET.
pub fn classify(endpoint: &str) -> EndpointClass {
    if !is_known(endpoint) {
        tracing::debug!(endpoint, "unknown sequencer endpoint, using feeder gateway GET");
    }

    let is_post = POST_ENDPOINTS.contains(&endpoint);
    let method = if is_post { HttpMethod::Post } else { HttpMethod::Get };
    let base = if is_post || GATEWAY_ENDPOINTS.contains(&endpoint) {
        BaseKind::Gateway
    } else {
        BaseKind::FeederGateway
    };

    EndpointClass { base, method }
}
