use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::endpoint::HttpMethod;
use crate::error::{ConfigError, TransportFailure};

/// A fully built request, ready for either delivery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// What either delivery path hands back before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            body: body.into(),
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch-style HTTP collaborator.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn fetch(&self, request: WireRequest) -> anyhow::Result<RawResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: WireRequest) -> anyhow::Result<RawResponse> {
        let mut builder = self.client.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        // The body is needed for error decoding even on non-2xx.
        let body = response.text().await?;

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Why a delivery attempt produced no response.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("request cancelled by caller")]
    Cancelled,
    #[error("{0:#}")]
    Failed(anyhow::Error),
}

impl DeliveryError {
    pub fn failure(&self) -> TransportFailure {
        match self {
            Self::Timeout(_) => TransportFailure::Timeout,
            Self::Cancelled => TransportFailure::Cancelled,
            Self::Failed(_) => TransportFailure::Delivery,
        }
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .is_some_and(reqwest::Error::is_timeout)
}

/// Runs one delivery attempt under a timeout and an optional cancellation token.
pub(crate) async fn bounded<T, F>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<T, DeliveryError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let timed = async {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if is_timeout(&e) => Err(DeliveryError::Timeout(timeout)),
            Ok(Err(e)) => Err(DeliveryError::Failed(e)),
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(DeliveryError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}
