pub mod sdk;
pub mod session;
pub mod store;

pub use sdk::{CryptoHandle, RelayRequest, RelaySdk, RelaySdkFactory, RelaySdkOptions};
pub use session::{RelaySession, SessionState};
pub use store::{KeyValueStore, MemoryStore, NamespacedStore};
