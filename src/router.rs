//! Per-call transport state machine: build the wire request, pick the direct or
//! relay path, deliver, decode.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::codec::{self, DecodeMode};
use crate::config::NormalizedConfig;
use crate::endpoint::{self, BaseKind, HttpMethod};
use crate::error::{Result, SequencerError};
use crate::http::{bounded, DeliveryError, HttpTransport, RawResponse, WireRequest};
use crate::query::{self, QueryParams};
use crate::relay::RelaySession;
use crate::types::LogLevel;

const CONTENT_TYPE: &str = "Content-Type";

#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    endpoint: String,
    query: Option<QueryParams>,
    body: Option<Value>,
    method: Option<HttpMethod>,
}

impl RequestDescriptor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query: None,
            body: None,
            method: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| SequencerError::Encoding(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query(&self) -> Option<&QueryParams> {
        self.query.as_ref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Parse every numeric literal in the response as an exact integer.
    pub big_int_decode: bool,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn big_int() -> Self {
        Self {
            big_int_decode: true,
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Relay,
}

pub struct TransportRouter {
    gateway_url: String,
    feeder_gateway_url: String,
    headers: BTreeMap<String, String>,
    http: Arc<dyn HttpTransport>,
    relay: Option<Arc<RelaySession>>,
    relay_endpoints: HashSet<String>,
    request_timeout: Duration,
    log_level: LogLevel,
}

impl TransportRouter {
    pub fn new(
        base_url: &Url,
        config: &NormalizedConfig,
        http: Arc<dyn HttpTransport>,
        relay: Option<Arc<RelaySession>>,
    ) -> Self {
        let base = base_url.as_str().trim_end_matches('/');
        Self {
            gateway_url: format!("{base}/{}", BaseKind::Gateway.path_segment()),
            feeder_gateway_url: format!("{base}/{}", BaseKind::FeederGateway.path_segment()),
            headers: config.headers.clone(),
            http,
            relay,
            relay_endpoints: config.relay.routed_endpoints.iter().cloned().collect(),
            request_timeout: config.request_timeout,
            log_level: config.log_level,
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    pub fn feeder_gateway_url(&self) -> &str {
        &self.feeder_gateway_url
    }

    pub fn relay_session(&self) -> Option<&Arc<RelaySession>> {
        self.relay.as_ref()
    }

    pub fn route_for(&self, endpoint: &str) -> Route {
        if self.relay.is_some() && self.relay_endpoints.contains(endpoint) {
            Route::Relay
        } else {
            Route::Direct
        }
    }

    /// POST carries `Content-Type: application/json` unless the provider's own
    /// headers set it; GET sends the provider headers untouched.
    pub fn headers_for(&self, method: HttpMethod) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if method == HttpMethod::Post
            && !self
                .headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE))
        {
            headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
        }
        headers.extend(self.headers.clone());
        headers
    }

    pub fn build(&self, request: &RequestDescriptor) -> Result<WireRequest> {
        let class = endpoint::classify(request.endpoint());
        let method = request.method().unwrap_or(class.method);
        let base = match class.base {
            BaseKind::Gateway => &self.gateway_url,
            BaseKind::FeederGateway => &self.feeder_gateway_url,
        };
        let query = query::encode(request.query())?;
        let body = request.body().map(codec::encode).transpose()?;

        Ok(WireRequest {
            method,
            url: format!("{base}/{}{query}", request.endpoint()),
            headers: self.headers_for(method),
            body,
        })
    }

    pub async fn call(&self, request: &RequestDescriptor, options: &CallOptions) -> Result<Value> {
        let wire = self.build(request)?;
        let route = self.route_for(request.endpoint());
        let method = wire.method;
        let url = wire.url.clone();
        let started = Instant::now();

        let delivered = match route {
            Route::Direct => self.send_direct(wire, options.cancel.as_ref()).await,
            Route::Relay => self.send_relay(wire, options.cancel.as_ref()).await,
        };

        let response = match delivered {
            Ok(response) => response,
            Err(e) => {
                let err = SequencerError::transport(method, &url, e.failure(), &e);
                self.log(route, method, &url, None, started, &err.to_string());
                return Err(err);
            }
        };

        let result = decode_response(&response, DecodeMode::from_flag(options.big_int_decode));
        let outcome = match &result {
            Ok(_) => "sequencer call succeeded".to_string(),
            Err(e) => e.to_string(),
        };
        self.log(route, method, &url, Some(response.status), started, &outcome);
        result
    }

    async fn send_direct(
        &self,
        wire: WireRequest,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<RawResponse, DeliveryError> {
        bounded(self.http.fetch(wire), self.request_timeout, cancel).await
    }

    async fn send_relay(
        &self,
        wire: WireRequest,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<RawResponse, DeliveryError> {
        let Some(relay) = &self.relay else {
            return Err(DeliveryError::Failed(anyhow::anyhow!("no relay session configured")));
        };
        let body = wire.body.unwrap_or_default();
        relay.deliver(&wire.url, &body, cancel).await
    }

    fn log(
        &self,
        route: Route,
        method: HttpMethod,
        url: &str,
        status: Option<u16>,
        started: Instant,
        msg: &str,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match self.log_level {
            LogLevel::Info => tracing::info!(?route, %method, url, ?status, elapsed_ms, "{msg}"),
            LogLevel::Error => tracing::error!(?route, %method, url, ?status, elapsed_ms, "{msg}"),
            LogLevel::Debug => tracing::debug!(?route, %method, url, ?status, elapsed_ms, "{msg}"),
            LogLevel::Trace => tracing::trace!(?route, %method, url, ?status, elapsed_ms, "{msg}"),
            LogLevel::Warn => tracing::warn!(?route, %method, url, ?status, elapsed_ms, "{msg}"),
        }
    }
}

/// Non-2xx: a structured `{message, code}` body is a gateway error, anything
/// else an HTTP error. 2xx: decode in the requested mode.
pub fn decode_response(response: &RawResponse, mode: DecodeMode) -> Result<Value> {
    if !response.ok() {
        return Err(match codec::parse_gateway_error(&response.body) {
            Some((message, code)) => SequencerError::Gateway { message, code },
            None => SequencerError::Http {
                status: response.status,
                status_text: response.status_text.clone(),
            },
        });
    }

    codec::decode(&response.body, mode)
}
