//! Sequencer smoke check: reads a block (and optionally a contract nonce)
//! through a provider and reports each result with its error kind.

use std::time::Instant;

use chrono::Utc;
use sequencer_relay_rpc::{
    query::block_query, BlockIdentifier, CallOptions, Network, ProviderRegistry, ProviderSettings,
    QueryParams, SequencerApi, SequencerError,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Check {
    endpoint: String,
    ok: bool,
    elapsed_ms: u64,
    /// Short summary of a successful result
    detail: Option<Value>,
    error_kind: Option<&'static str>,
    error: Option<String>,
}

fn error_kind(err: &SequencerError) -> &'static str {
    match err {
        SequencerError::Encoding(_) => "encoding",
        SequencerError::Http { .. } => "http",
        SequencerError::Gateway { .. } => "gateway",
        SequencerError::Transport { .. } if err.is_timeout() => "timeout",
        SequencerError::Transport { .. } => "transport",
        SequencerError::Decode(_) => "decode",
    }
}

fn block_summary(block: &Value) -> Value {
    serde_json::json!({
        "block_number": block.get("block_number"),
        "block_hash": block.get("block_hash"),
        "status": block.get("status"),
        "transactions": block.get("transactions").and_then(Value::as_array).map(Vec::len),
    })
}

async fn run_check(
    provider: &dyn SequencerApi,
    endpoint: &str,
    query: &QueryParams,
    options: CallOptions,
    summarize: fn(&Value) -> Value,
) -> Check {
    let started = Instant::now();
    let result = provider.call(endpoint, Some(query), None, options).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(value) => Check {
            endpoint: endpoint.to_string(),
            ok: true,
            elapsed_ms,
            detail: Some(summarize(&value)),
            error_kind: None,
            error: None,
        },
        Err(e) => {
            tracing::error!(endpoint, error = %e, "smoke check failed");
            Check {
                endpoint: endpoint.to_string(),
                ok: false,
                elapsed_ms,
                detail: None,
                error_kind: Some(error_kind(&e)),
                error: Some(e.to_string()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let base_url = std::env::var("SEQUENCER_URL").unwrap_or_else(|_| "https://alpha4.starknet.io".to_string());
    let block: BlockIdentifier = std::env::var("BLOCK").unwrap_or_else(|_| "latest".to_string()).parse()?;
    let contract = std::env::var("CONTRACT").ok();
    let big_int = std::env::var("BIGINT").map(|v| v != "0").unwrap_or(false);
    let settings: ProviderSettings = match std::env::var("SETTINGS") {
        Ok(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        Err(_) => ProviderSettings::default(),
    };

    println!("[smoke] sequencer_url={} block={}", base_url, block);

    let registry = ProviderRegistry::builder().settings(settings).build()?;
    let network = Network::new("smoke", "smoke", base_url.parse()?);
    let provider = registry.get_legacy_provider(&network);
    let options = CallOptions { big_int_decode: big_int, ..CallOptions::default() };

    let mut checks = vec![
        run_check(provider.as_ref(), "get_block", &block_query(Some(block.clone())), options.clone(), block_summary).await,
    ];

    if let Some(contract) = contract {
        let mut query = block_query(Some(block));
        query.insert("contractAddress".to_string(), Value::String(contract));
        checks.push(run_check(provider.as_ref(), "get_nonce", &query, options, Value::clone).await);
    }

    let failed = checks.iter().filter(|c| !c.ok).count();
    let out = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "sequencer_url": base_url,
        "checks": checks,
        "failed": failed,
    });
    println!("SMOKE_RESULT {}", serde_json::to_string(&out)?);

    registry.shutdown().await;
    if failed > 0 {
        anyhow::bail!("{failed} smoke check(s) failed");
    }
    Ok(())
}
