pub mod legacy;
pub mod registry;
pub mod sequencer;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::query::QueryParams;
use crate::router::CallOptions;

pub use legacy::LegacyProvider;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use sequencer::SequencerProvider;

/// The call surface shared by both provider families.
#[async_trait]
pub trait SequencerApi: Send + Sync {
    fn base_url(&self) -> &Url;

    async fn call(
        &self,
        endpoint: &str,
        query: Option<&QueryParams>,
        body: Option<&Value>,
        options: CallOptions,
    ) -> Result<Value>;
}
