pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod provider;
pub mod query;
pub mod relay;
pub mod router;
pub mod types;

pub use error::{ConfigError, Result, SequencerError, TransportFailure};
pub use types::{LogLevel, Network, NetworkId, ProviderSettings, RelayLifecycle, RelaySettings};

// Re-export commonly used items
pub use codec::DecodeMode;
pub use config::{resolve_config, NormalizedConfig, RelayConfig};
pub use endpoint::{classify, BaseKind, EndpointClass, HttpMethod};
pub use http::{HttpTransport, RawResponse, ReqwestTransport, WireRequest};
pub use provider::{LegacyProvider, ProviderRegistry, SequencerApi, SequencerProvider};
pub use query::{BlockIdentifier, QueryParams};
pub use relay::{CryptoHandle, KeyValueStore, MemoryStore, RelaySdk, RelaySdkFactory, RelaySession};
pub use router::{CallOptions, RequestDescriptor, Route, TransportRouter};
