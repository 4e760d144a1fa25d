//! Query-string construction for sequencer endpoints.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, SequencerError};

/// Query parameters in caller insertion order.
pub type QueryParams = serde_json::Map<String, Value>;

pub const BLOCK_IDENTIFIER_KEY: &str = "blockIdentifier";

/// Selects the chain state snapshot a read applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockIdentifier {
    Number(u64),
    Hash(String),
    Latest,
    Pending,
}

impl BlockIdentifier {
    pub fn query_fragment(&self) -> String {
        match self {
            Self::Number(number) => format!("blockNumber={number}"),
            Self::Hash(hash) => format!("blockHash={hash}"),
            Self::Latest => "blockNumber=latest".to_string(),
            Self::Pending => "blockNumber=pending".to_string(),
        }
    }
}

impl fmt::Display for BlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Hash(hash) => f.write_str(hash),
            Self::Latest => f.write_str("latest"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

fn is_hex(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

/// `latest`, `pending`, `0x`-prefixed hex (a block hash) or a decimal block
/// number such as `"5"`. Anything else is an encoding error rather than a
/// silent fallback to `pending`.
impl FromStr for BlockIdentifier {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            _ if is_hex(s) => Ok(Self::Hash(s.to_string())),
            _ => s.parse::<u64>().map(Self::Number).map_err(|_| {
                SequencerError::Encoding(format!("invalid block identifier `{s}`"))
            }),
        }
    }
}

impl TryFrom<&Value> for BlockIdentifier {
    type Error = SequencerError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Number(number) => number.as_u64().map(Self::Number).ok_or_else(|| {
                SequencerError::Encoding(format!("block number must be a non-negative integer, got {number}"))
            }),
            Value::String(s) => s.parse(),
            other => Err(SequencerError::Encoding(format!(
                "invalid block identifier {other}"
            ))),
        }
    }
}

impl From<BlockIdentifier> for Value {
    fn from(block: BlockIdentifier) -> Self {
        match block {
            BlockIdentifier::Number(number) => Value::from(number),
            other => Value::String(other.to_string()),
        }
    }
}

/// Builds `{"blockIdentifier": ...}`, with `None` meaning "no preference".
pub fn block_query(block: Option<BlockIdentifier>) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert(
        BLOCK_IDENTIFIER_KEY.to_string(),
        block.map(Value::from).unwrap_or(Value::Null),
    );
    params
}

/// Absent, no keys, or nothing but a null `blockIdentifier`.
pub fn is_empty_query(params: Option<&QueryParams>) -> bool {
    match params {
        None => true,
        Some(params) if params.is_empty() => true,
        Some(params) => {
            params.len() == 1 && matches!(params.get(BLOCK_IDENTIFIER_KEY), Some(Value::Null))
        }
    }
}

fn render_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => Err(SequencerError::Encoding(format!(
            "query parameter `{key}` must be a primitive"
        ))),
    }
}

/// Returns `""` for an empty query, `"?k=v&..."` otherwise.
pub fn encode(params: Option<&QueryParams>) -> Result<String> {
    let params = match params {
        Some(params) if !is_empty_query(Some(params)) => params,
        _ => return Ok(String::new()),
    };

    let mut fragments = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key == BLOCK_IDENTIFIER_KEY {
            if value.is_null() {
                continue;
            }
            fragments.push(BlockIdentifier::try_from(value)?.query_fragment());
        } else {
            fragments.push(format!("{key}={}", render_value(key, value)?));
        }
    }

    Ok(format!("?{}", fragments.join("&")))
}
