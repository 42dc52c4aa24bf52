//! Key normalization and value coercion.
//!
//! Values are persisted as JSON text and decoded leniently on the way back:
//! text that is not JSON comes back as a string, and strings that look like
//! booleans or finite numbers are coerced. The coercion applies to every
//! string, so a value stored as the string `"42"` reads back as the number
//! `42`. Callers that need numeric-looking strings preserved should wrap them
//! in an object.

use crate::error::Result;
use serde_json::{Number, Value};

/// Apply the namespace prefix to `key`.
pub fn normalize(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{key}"),
        _ => key.to_string(),
    }
}

/// Serialize a value into its stored form.
pub fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a stored string, coercing boolean and numeric strings.
pub fn decode(raw: &str) -> Value {
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    coerce(value)
}

fn coerce(value: Value) -> Value {
    let Value::String(s) = value else {
        return value;
    };

    match s.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    match parse_finite(&s) {
        Some(n) => Value::Number(n),
        None => Value::String(s),
    }
}

fn parse_finite(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // f64 parsing accepts "inf" and "nan"; those are rejected by the finite check.
    let n: f64 = trimmed.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Number::from(n as i64));
    }
    Number::from_f64(n)
}
