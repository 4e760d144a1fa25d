//! JSON encoding and the two decode modes.
//!
//! Sequencer responses carry field elements and balances well past 2^53, so
//! callers can ask for every numeric literal to be kept as an exact integer.
//! The standard mode mirrors a float-only JSON parser and may round.

use std::str::FromStr;

use num_bigint::BigInt;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{Result, SequencerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    #[default]
    Standard,
    BigInt,
}

impl DecodeMode {
    pub fn from_flag(big_int: bool) -> Self {
        if big_int { Self::BigInt } else { Self::Standard }
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| SequencerError::Encoding(e.to_string()))
}

pub fn decode(text: &str, mode: DecodeMode) -> Result<Value> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| SequencerError::Decode(e.to_string()))?;

    match mode {
        DecodeMode::Standard => map_numbers(value, &native_number),
        DecodeMode::BigInt => map_numbers(value, &exact_integer),
    }
}

fn map_numbers(value: Value, f: &dyn Fn(&Number) -> Result<Number>) -> Result<Value> {
    Ok(match value {
        Value::Number(n) => Value::Number(f(&n)?),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| map_numbers(item, f))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| Ok((k, map_numbers(v, f)?)))
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

fn native_number(n: &Number) -> Result<Number> {
    let float = n
        .as_f64()
        .ok_or_else(|| SequencerError::Decode(format!("number {n} is not representable")))?;

    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Ok(Number::from(float as i64));
    }
    Number::from_f64(float)
        .ok_or_else(|| SequencerError::Decode(format!("number {n} is not finite")))
}

fn exact_integer(n: &Number) -> Result<Number> {
    let literal = n.to_string();
    let big = BigInt::from_str(&literal)
        .map_err(|_| SequencerError::Decode(format!("`{literal}` is not an integer literal")))?;
    serde_json::from_str(&big.to_string()).map_err(|e| SequencerError::Decode(e.to_string()))
}

/// Lifts an exact integer out of a decoded value. Accepts JSON integers and
/// decimal or `0x` hex strings.
pub fn as_big_int(value: &Value) -> Option<BigInt> {
    match value {
        Value::Number(n) => BigInt::from_str(&n.to_string()).ok(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16),
            None => BigInt::from_str(s).ok(),
        },
        _ => None,
    }
}

/// Structured gateway error payload: a JSON object with `message` and/or `code`.
pub fn parse_gateway_error(text: &str) -> Option<(String, String)> {
    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text) else {
        return None;
    };

    let field = |name: &str| match body.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    let message = field("message");
    let code = field("code");
    if message.is_none() && code.is_none() {
        return None;
    }
    Some((message.unwrap_or_default(), code.unwrap_or_default()))
}
