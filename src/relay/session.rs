use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::http::{bounded, DeliveryError, RawResponse};
use crate::relay::sdk::{CryptoHandle, RelayRequest, RelaySdk, RelaySdkFactory, RelaySdkOptions};
use crate::relay::store::{KeyValueStore, NamespacedStore};
use crate::types::RelayLifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Starting,
    Running,
    Stopped,
}

/// One relay SDK instance plus its lifecycle, owned by a single provider.
///
/// Start/stop transitions happen under `lifecycle_lock`; the count of relay
/// sends in flight only goes up while it is held. Under
/// [`RelayLifecycle::PerCall`] the session is started when that count leaves
/// zero and stopped when it returns to zero, so overlapping calls never tear
/// down a session another call still uses.
pub struct RelaySession {
    sdk: Arc<dyn RelaySdk>,
    store: Arc<NamespacedStore>,
    lifecycle: RelayLifecycle,
    timeout: Duration,
    state: RwLock<SessionState>,
    lifecycle_lock: Mutex<()>,
    in_flight: AtomicUsize,
}

impl RelaySession {
    pub fn new(
        factory: &dyn RelaySdkFactory,
        crypto: CryptoHandle,
        config: &RelayConfig,
        store: Arc<dyn KeyValueStore>,
        namespace: &str,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(NamespacedStore::new(store, namespace));
        let options = RelaySdkOptions {
            crypto,
            client_id: config.client_id.clone(),
            timeout: config.timeout,
            discovery_endpoint: config.discovery_endpoint.clone(),
        };
        let sdk = factory.create(options, store.clone())?;

        if let Some(pattern) = &config.debug_pattern {
            sdk.debug_enable(pattern);
        }

        Ok(Self::with_sdk(sdk, store, config.lifecycle, config.timeout))
    }

    pub fn with_sdk(
        sdk: Arc<dyn RelaySdk>,
        store: Arc<NamespacedStore>,
        lifecycle: RelayLifecycle,
        timeout: Duration,
    ) -> Self {
        Self {
            sdk,
            store,
            lifecycle,
            timeout,
            state: RwLock::new(SessionState::Uninitialized),
            lifecycle_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn lifecycle(&self) -> RelayLifecycle {
        self.lifecycle
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn store(&self) -> &NamespacedStore {
        &self.store
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        self.start_locked().await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        self.stop_locked().await
    }

    pub async fn create_request(&self, url: &str, body: &str) -> anyhow::Result<RelayRequest> {
        self.sdk.create_request(url, body).await
    }

    pub async fn send_request(&self, request: RelayRequest) -> anyhow::Result<RawResponse> {
        self.sdk.send_request(request).await
    }

    async fn start_locked(&self) -> anyhow::Result<()> {
        let previous = self.state();
        if previous == SessionState::Running {
            return Ok(());
        }

        *self.state.write() = SessionState::Starting;
        // Dropped mid-start (timeout or cancellation): back to `previous`.
        let mut restore = RestoreState {
            state: &self.state,
            previous,
            armed: true,
        };
        let started = self.sdk.start().await;
        restore.armed = false;

        match started {
            Ok(()) => {
                *self.state.write() = SessionState::Running;
                tracing::debug!(lifecycle = ?self.lifecycle, "relay session started");
                Ok(())
            }
            Err(e) => {
                *self.state.write() = previous;
                Err(e.context("relay session failed to start"))
            }
        }
    }

    async fn stop_locked(&self) -> anyhow::Result<()> {
        if self.state() != SessionState::Running {
            return Ok(());
        }

        self.sdk.stop().await?;
        *self.state.write() = SessionState::Stopped;
        tracing::debug!(lifecycle = ?self.lifecycle, "relay session stopped");
        Ok(())
    }

    async fn acquire(self: &Arc<Self>) -> anyhow::Result<InFlight> {
        let _guard = self.lifecycle_lock.lock().await;
        // Ambient sessions start lazily on first use and then stay up.
        if self.lifecycle == RelayLifecycle::Ambient || self.in_flight.load(Ordering::SeqCst) == 0 {
            self.start_locked().await?;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(InFlight {
            session: Arc::clone(self),
            done: false,
        })
    }

    /// Drops one in-flight send. True when a per-call session just went idle.
    fn leave(&self) -> bool {
        let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.lifecycle == RelayLifecycle::PerCall && previous == 1
    }

    async fn stop_if_idle(&self) {
        let _guard = self.lifecycle_lock.lock().await;
        // Another call may have started since the count hit zero.
        if self.in_flight.load(Ordering::SeqCst) != 0 {
            return;
        }
        if let Err(e) = self.stop_locked().await {
            tracing::warn!(error = %e, "relay session failed to stop");
        }
    }

    /// Create and send one relay request, applying the lifecycle policy.
    ///
    /// Starting the session, waiting on the lifecycle lock and the send itself
    /// all share the relay timeout and the caller's cancellation token.
    pub(crate) async fn deliver(
        self: &Arc<Self>,
        url: &str,
        body: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse, DeliveryError> {
        bounded(
            async {
                let in_flight = self.acquire().await?;
                let result = async {
                    let request = self.sdk.create_request(url, body).await?;
                    self.sdk.send_request(request).await
                }
                .await;
                in_flight.finish().await;
                result
            },
            self.timeout,
            cancel,
        )
        .await
    }
}

/// One relay send holding the session open. Dropping it without `finish`
/// (the call future was dropped) still releases the slot; the per-call stop
/// then runs on a spawned task.
struct InFlight {
    session: Arc<RelaySession>,
    done: bool,
}

impl InFlight {
    async fn finish(mut self) {
        self.done = true;
        if self.session.leave() {
            self.session.stop_if_idle().await;
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.done || !self.session.leave() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(&self.session);
                handle.spawn(async move { session.stop_if_idle().await });
            }
            Err(_) => tracing::warn!("relay call dropped outside a runtime, session left running"),
        }
    }
}

struct RestoreState<'a> {
    state: &'a RwLock<SessionState>,
    previous: SessionState,
    armed: bool,
}

impl Drop for RestoreState<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.write() = self.previous;
        }
    }
}
