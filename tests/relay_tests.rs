mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeRelayFactory, Reply, TestCrypto};
use futures::future::join_all;
use sequencer_relay_rpc::relay::SessionState;
use sequencer_relay_rpc::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn relay_settings(relay: RelaySettings) -> ProviderSettings {
    ProviderSettings { log_level: LogLevel::Debug, relay: Some(relay), ..ProviderSettings::default() }
}

fn registry(factory: Arc<FakeRelayFactory>, settings: ProviderSettings, store: MemoryStore) -> ProviderRegistry {
    ProviderRegistry::builder()
        .settings(settings)
        .store(Arc::new(store))
        .relay_sdk(factory, CryptoHandle::new(TestCrypto("test-crypto")))
        .build()
        .unwrap()
}

fn relay_network(base_url: &str) -> Network {
    Network::new("relay-testnet", "Relay testnet", base_url.parse().unwrap()).with_relay_routing(true)
}

#[tokio::test]
async fn test_add_transaction_goes_through_relay_others_direct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feeder_gateway/get_block"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"block_number": 1}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/gateway/add_transaction"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let factory = FakeRelayFactory::new(Reply::Echo);
    let registry = registry(factory.clone(), relay_settings(RelaySettings::default()), MemoryStore::new());
    let provider = registry.get_provider(&relay_network(&server.uri())).unwrap();

    assert_eq!(provider.router().route_for("add_transaction"), Route::Relay);
    assert_eq!(provider.router().route_for("get_block"), Route::Direct);

    let tx = json!({"type": "INVOKE_FUNCTION", "nonce": "0x1"});
    let echoed = provider
        .call("add_transaction", None, Some(&tx), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(echoed["url"], json!(format!("{}/gateway/add_transaction", server.uri())));
    assert_eq!(echoed["body"], tx);

    let block = provider.call("get_block", None, None, CallOptions::default()).await.unwrap();
    assert_eq!(block, json!({"block_number": 1}));

    let sdk = factory.sdk(0);
    assert_eq!(sdk.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_sdk_built_from_configuration() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let settings = relay_settings(RelaySettings {
        client_id: Some("sandbox".into()),
        timeout_ms: Some(1234),
        discovery_endpoint: Some("https://discovery.example.org".into()),
        debug_pattern: Some("rpch:*".into()),
        ..RelaySettings::default()
    });
    let registry = registry(factory.clone(), settings, MemoryStore::new());
    registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let sdk = factory.sdk(0);
    assert_eq!(sdk.options.client_id, "sandbox");
    assert_eq!(sdk.options.timeout, Duration::from_millis(1234));
    assert_eq!(sdk.options.discovery_endpoint.host_str(), Some("discovery.example.org"));
    assert_eq!(sdk.options.crypto.downcast_ref::<TestCrypto>(), Some(&TestCrypto("test-crypto")));
    assert_eq!(*sdk.debug_patterns.lock(), vec!["rpch:*".to_string()]);
}

#[tokio::test]
async fn test_debug_output_off_by_default() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let registry = registry(factory.clone(), relay_settings(RelaySettings::default()), MemoryStore::new());
    registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();
    assert!(factory.sdk(0).debug_patterns.lock().is_empty());
}

#[tokio::test]
async fn test_ambient_session_starts_once_and_stays_up() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let registry = registry(factory.clone(), relay_settings(RelaySettings::default()), MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();
    let session = provider.relay_session().unwrap();
    assert_eq!(session.state(), SessionState::Uninitialized);

    for i in 0..3 {
        provider
            .call("add_transaction", None, Some(&json!({"i": i})), CallOptions::default())
            .await
            .unwrap();
    }

    let sdk = factory.sdk(0);
    assert_eq!(sdk.starts.load(Ordering::SeqCst), 1);
    assert_eq!(sdk.stops.load(Ordering::SeqCst), 0);
    assert_eq!(session.state(), SessionState::Running);

    registry.shutdown().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(sdk.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_per_call_session_stops_between_calls() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let settings = relay_settings(RelaySettings { lifecycle: RelayLifecycle::PerCall, ..RelaySettings::default() });
    let registry = registry(factory.clone(), settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    for i in 0..2 {
        provider
            .call("add_transaction", None, Some(&json!({"i": i})), CallOptions::default())
            .await
            .unwrap();
        assert_eq!(provider.relay_session().unwrap().state(), SessionState::Stopped);
    }

    let sdk = factory.sdk(0);
    assert_eq!(sdk.starts.load(Ordering::SeqCst), 2);
    assert_eq!(sdk.stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_per_call_overlapping_calls_share_running_session() {
    let factory = FakeRelayFactory::with_delay(Reply::Echo, Duration::from_millis(40));
    let settings = relay_settings(RelaySettings { lifecycle: RelayLifecycle::PerCall, ..RelaySettings::default() });
    let registry = registry(factory.clone(), settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let bodies: Vec<_> = (0..5).map(|i| json!({"i": i})).collect();
    let results = join_all(
        bodies
            .iter()
            .map(|body| provider.call("add_transaction", None, Some(body), CallOptions::default())),
    )
    .await;

    for (body, result) in bodies.iter().zip(results) {
        assert_eq!(&result.unwrap()["body"], body);
    }

    let sdk = factory.sdk(0);
    assert!(sdk.max_concurrent_sends.load(Ordering::SeqCst) > 1);
    assert_eq!(sdk.starts.load(Ordering::SeqCst), sdk.stops.load(Ordering::SeqCst));
    assert_eq!(provider.relay_session().unwrap().state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_concurrent_ambient_calls_get_their_own_responses() {
    let factory = FakeRelayFactory::with_delay(Reply::Echo, Duration::from_millis(20));
    let store = MemoryStore::new();
    let registry = registry(factory.clone(), relay_settings(RelaySettings::default()), store.clone());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let bodies: Vec<_> = (0..8).map(|i| json!({"tx": i})).collect();
    let results = join_all(
        bodies
            .iter()
            .map(|body| provider.call("add_transaction", None, Some(body), CallOptions::default())),
    )
    .await;

    for (body, result) in bodies.iter().zip(results) {
        assert_eq!(&result.unwrap()["body"], body);
    }
    assert_eq!(store.len(), 8);
    assert!(store.keys().iter().all(|k| k.starts_with("relay/https://alpha4.example.org/")));
}

#[tokio::test]
async fn test_relay_sessions_namespace_the_shared_store() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let store = MemoryStore::new();
    let registry = registry(factory.clone(), relay_settings(RelaySettings::default()), store.clone());

    let a = registry.get_provider(&relay_network("https://a.example.org")).unwrap();
    let b = registry.get_provider(&relay_network("https://b.example.org")).unwrap();
    a.call("add_transaction", None, Some(&json!({"from": "a"})), CallOptions::default()).await.unwrap();
    b.call("add_transaction", None, Some(&json!({"from": "b"})), CallOptions::default()).await.unwrap();

    // Both SDKs number their first request "1"; the namespaces keep them apart.
    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys, vec![
        "relay/https://a.example.org/request/1".to_string(),
        "relay/https://b.example.org/request/1".to_string(),
    ]);
    assert_eq!(
        a.relay_session().unwrap().store().get("request/1").await.unwrap().as_deref(),
        Some(r#"{"from":"a"}"#)
    );
}

#[tokio::test]
async fn test_relay_timeout_is_transport_error_with_url() {
    let factory = FakeRelayFactory::new(Reply::Stall);
    let settings = relay_settings(RelaySettings { timeout_ms: Some(50), ..RelaySettings::default() });
    let registry = registry(factory, settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let err = provider
        .call("add_transaction", None, Some(&json!({})), CallOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
    assert!(err.to_string().contains("https://alpha4.example.org/gateway/add_transaction"));
}

#[tokio::test]
async fn test_relay_sdk_failure_is_wrapped() {
    let factory = FakeRelayFactory::new(Reply::Fail("no exit node available".into()));
    let registry = registry(factory, relay_settings(RelaySettings::default()), MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let err = provider
        .call("add_transaction", None, Some(&json!({})), CallOptions::default())
        .await
        .unwrap_err();
    match err {
        SequencerError::Transport { method, url, failure, reason } => {
            assert_eq!(method, "POST");
            assert_eq!(url, "https://alpha4.example.org/gateway/add_transaction");
            assert_eq!(failure, TransportFailure::Delivery);
            assert!(reason.contains("no exit node available"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_error_responses_use_same_taxonomy() {
    let factory = FakeRelayFactory::new(Reply::Fixed(RawResponse::new(
        400,
        r#"{"message":"Invalid transaction nonce","code":"StarknetErrorCode.INVALID_TRANSACTION_NONCE"}"#,
    )));
    let registry = registry(factory, relay_settings(RelaySettings::default()), MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let err = provider
        .call("add_transaction", None, Some(&json!({})), CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SequencerError::Gateway { ref code, .. } if code == "StarknetErrorCode.INVALID_TRANSACTION_NONCE"
    ));
}

#[tokio::test]
async fn test_routed_endpoints_are_configurable() {
    let factory = FakeRelayFactory::new(Reply::Echo);
    let settings = relay_settings(RelaySettings {
        routed_endpoints: Some(vec!["add_transaction".into(), "estimate_fee".into()]),
        ..RelaySettings::default()
    });
    let registry = registry(factory, settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    assert_eq!(provider.router().route_for("estimate_fee"), Route::Relay);
    let echoed = provider
        .call("estimate_fee", None, Some(&json!({"fee": 1})), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(echoed["url"], json!("https://alpha4.example.org/gateway/estimate_fee"));
}

#[tokio::test]
async fn test_per_call_session_stops_after_caller_drops_a_call() {
    let factory = FakeRelayFactory::with_delay(Reply::Echo, Duration::from_millis(200));
    let settings = relay_settings(RelaySettings { lifecycle: RelayLifecycle::PerCall, ..RelaySettings::default() });
    let registry = registry(factory.clone(), settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        provider.call("add_transaction", None, Some(&json!({"n": 1})), CallOptions::default()),
    )
    .await;
    assert!(abandoned.is_err());

    let echoed = provider
        .call("add_transaction", None, Some(&json!({"n": 2})), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(echoed["body"], json!({"n": 2}));

    let sdk = factory.sdk(0);
    assert_eq!(provider.relay_session().unwrap().state(), SessionState::Stopped);
    assert_eq!(sdk.starts.load(Ordering::SeqCst), sdk.stops.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_stalled_session_start_hits_relay_timeout() {
    let factory = FakeRelayFactory::with_stalled_start(Reply::Echo);
    let settings = relay_settings(RelaySettings { timeout_ms: Some(50), ..RelaySettings::default() });
    let registry = registry(factory, settings, MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        provider.call("add_transaction", None, Some(&json!({})), CallOptions::default()),
    )
    .await
    .expect("relay timeout should cover session start")
    .unwrap_err();

    assert!(err.is_timeout(), "{err:?}");
    assert!(err.to_string().contains("https://alpha4.example.org/gateway/add_transaction"));
    assert_eq!(provider.relay_session().unwrap().state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_stalled_session_start_honours_cancellation() {
    let factory = FakeRelayFactory::with_stalled_start(Reply::Echo);
    let registry = registry(factory, relay_settings(RelaySettings::default()), MemoryStore::new());
    let provider = registry.get_provider(&relay_network("https://alpha4.example.org")).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        provider.call("add_transaction", None, Some(&json!({})), CallOptions::default().with_cancel(token)),
    )
    .await
    .expect("cancellation should cover session start")
    .unwrap_err();

    assert!(matches!(err, SequencerError::Transport { failure: TransportFailure::Cancelled, .. }));
}
