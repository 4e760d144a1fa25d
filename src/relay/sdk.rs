use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::http::RawResponse;
use crate::relay::store::KeyValueStore;

/// Opaque handle to the cryptographic backend the relay SDK is built with.
#[derive(Clone)]
pub struct CryptoHandle(Arc<dyn Any + Send + Sync>);

impl CryptoHandle {
    pub fn new<T: Any + Send + Sync>(backend: T) -> Self {
        Self(Arc::new(backend))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for CryptoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CryptoHandle").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RelaySdkOptions {
    pub crypto: CryptoHandle,
    pub client_id: String,
    pub timeout: Duration,
    pub discovery_endpoint: Url,
}

/// A request prepared by the SDK for delivery through the mix network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub id: String,
    pub url: String,
    pub body: String,
}

/// Contract of the external relay SDK.
#[async_trait]
pub trait RelaySdk: Send + Sync + 'static {
    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;

    async fn create_request(&self, url: &str, body: &str) -> anyhow::Result<RelayRequest>;

    async fn send_request(&self, request: RelayRequest) -> anyhow::Result<RawResponse>;

    /// Turns on SDK debug output for namespaces matching `pattern`.
    fn debug_enable(&self, pattern: &str);
}

/// Builds one SDK instance per relay session.
pub trait RelaySdkFactory: Send + Sync + 'static {
    fn create(
        &self,
        options: RelaySdkOptions,
        store: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<Arc<dyn RelaySdk>>;
}
