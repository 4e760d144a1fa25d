use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::provider::SequencerApi;
use crate::query::QueryParams;
use crate::relay::RelaySession;
use crate::router::{CallOptions, RequestDescriptor, TransportRouter};
use crate::types::NetworkId;

/// Privacy-capable provider: routes the configured endpoints through its own
/// relay session, everything else over direct HTTP.
pub struct SequencerProvider {
    network_id: NetworkId,
    base_url: Url,
    router: TransportRouter,
}

impl SequencerProvider {
    pub fn new(network_id: NetworkId, base_url: Url, router: TransportRouter) -> Self {
        Self {
            network_id,
            base_url,
            router,
        }
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn router(&self) -> &TransportRouter {
        &self.router
    }

    pub fn relay_session(&self) -> Option<&Arc<RelaySession>> {
        self.router.relay_session()
    }

    pub async fn fetch(&self, request: &RequestDescriptor, options: &CallOptions) -> Result<Value> {
        self.router.call(request, options).await
    }
}

#[async_trait]
impl SequencerApi for SequencerProvider {
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

pub(crate) fn descriptor(
    endpoint: &str,
    query: Option<&QueryParams>,
    body: Option<&Value>,
) -> Result<RequestDescriptor> {
    let mut request = RequestDescriptor::new(endpoint);
    if let Some(query) = query {
        request = request.with_query(query.clone());
    }
    if let Some(body) = body {
        request = request.with_body(body)?;
    }
    Ok(request)
}
