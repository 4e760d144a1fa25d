use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::provider::sequencer::descriptor;
use crate::provider::SequencerApi;
use crate::query::QueryParams;
use crate::router::{CallOptions, RequestDescriptor, TransportRouter};

/// Provider for the previous sequencer API generation. Always direct HTTP.
pub struct LegacyProvider {
    base_url: Url,
    router: TransportRouter,
}

impl LegacyProvider {
    pub fn new(base_url: Url, router: TransportRouter) -> Self {
        Self { base_url, router }
    }

    pub fn router(&self) -> &TransportRouter {
        &self.router
    }

    pub async fn fetch(&self, request: &RequestDescriptor, options: &CallOptions) -> Result<Value> {
        self.router.call(request, options).await
    }
}

#[async_trait]
impl SequencerApi for LegacyProvider {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call(
        &self,
        endpoint: &str,
        query: Option<&QueryParams>,
        body: Option<&Value>,
        options: CallOptions,
    ) -> Result<Value> {
        let request = descriptor(endpoint, query, body)?;
        self.fetch(&request, &options).await
    }
}
