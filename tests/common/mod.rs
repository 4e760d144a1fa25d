#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sequencer_relay_rpc::relay::{RelayRequest, RelaySdkOptions};
use sequencer_relay_rpc::{KeyValueStore, RawResponse, RelaySdk, RelaySdkFactory};
use serde_json::json;

#[derive(Clone)]
pub enum Reply {
    /// 200 with `{"url": .., "body": ..}` so each caller can check it got its own answer.
    Echo,
    Fixed(RawResponse),
    Fail(String),
    Stall,
}

pub struct FakeRelaySdk {
    pub options: RelaySdkOptions,
    pub store: Arc<dyn KeyValueStore>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub running: AtomicBool,
    pub max_concurrent_sends: AtomicUsize,
    in_flight: AtomicUsize,
    next_id: AtomicU64,
    pub sent: Mutex<Vec<RelayRequest>>,
    pub debug_patterns: Mutex<Vec<String>>,
    reply: Reply,
    delay: Duration,
    stall_start: bool,
}

#[async_trait]
impl RelaySdk for FakeRelaySdk {
    async fn start(&self) -> anyhow::Result<()> {
        if self.stall_start {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn create_request(&self, url: &str, body: &str) -> anyhow::Result<RelayRequest> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(RelayRequest { id: id.to_string(), url: url.to_string(), body: body.to_string() })
    }

    async fn send_request(&self, request: RelayRequest) -> anyhow::Result<RawResponse> {
        if !self.running.load(Ordering::SeqCst) {
            anyhow::bail!("relay sdk is not running");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_sends.fetch_max(now, Ordering::SeqCst);

        self.store.set(&format!("request/{}", request.id), request.body.clone()).await?;
        self.sent.lock().push(request.clone());

        let reply = match &self.reply {
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("stalled relay send should have been cut off")
            }
            Reply::Fail(msg) => Err(anyhow::anyhow!(msg.clone())),
            Reply::Fixed(response) => Ok(response.clone()),
            Reply::Echo => {
                tokio::time::sleep(self.delay).await;
                let body: serde_json::Value = serde_json::from_str(&request.body).unwrap_or(serde_json::Value::Null);
                Ok(RawResponse::new(200, json!({"url": request.url, "body": body}).to_string()))
            }
        };

        if !self.running.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("relay session stopped mid-flight");
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }

    fn debug_enable(&self, pattern: &str) {
        self.debug_patterns.lock().push(pattern.to_string());
    }
}

pub struct FakeRelayFactory {
    reply: Reply,
    delay: Duration,
    stall_start: bool,
    pub created: Mutex<Vec<Arc<FakeRelaySdk>>>,
}

impl FakeRelayFactory {
    pub fn new(reply: Reply) -> Arc<Self> {
        Self::with_delay(reply, Duration::ZERO)
    }

    pub fn with_delay(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self { reply, delay, stall_start: false, created: Mutex::new(Vec::new()) })
    }

    /// SDKs whose `start` never completes.
    pub fn with_stalled_start(reply: Reply) -> Arc<Self> {
        Arc::new(Self { reply, delay: Duration::ZERO, stall_start: true, created: Mutex::new(Vec::new()) })
    }

    pub fn sdk(&self, idx: usize) -> Arc<FakeRelaySdk> {
        Arc::clone(&self.created.lock()[idx])
    }
}

impl RelaySdkFactory for FakeRelayFactory {
    fn create(&self, options: RelaySdkOptions, store: Arc<dyn KeyValueStore>) -> anyhow::Result<Arc<dyn RelaySdk>> {
        let sdk = Arc::new(FakeRelaySdk {
            options,
            store,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            max_concurrent_sends: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
            debug_patterns: Mutex::new(Vec::new()),
            reply: self.reply.clone(),
            delay: self.delay,
            stall_start: self.stall_start,
        });
        self.created.lock().push(Arc::clone(&sdk));
        Ok(sdk)
    }
}

/// Marker type standing in for the relay crypto backend.
#[derive(Debug, PartialEq)]
pub struct TestCrypto(pub &'static str);
