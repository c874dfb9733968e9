//! Approximate byte accounting for keys and JSON values.
//!
//! The numbers here are a stable, monotone approximation of in-memory cost,
//! not exact heap bytes. Growing a value never shrinks its reported size, and
//! two structurally equal values always report the same size, which is what
//! the cache's budget arithmetic relies on.

use serde_json::Value;

/// Fixed overhead charged per string (header and allocation slack).
pub const STRING_OVERHEAD: usize = 24;

/// Size charged for a boolean or number scalar.
pub const SCALAR_SIZE: usize = 8;

/// Fixed overhead charged per array or object container.
pub const CONTAINER_OVERHEAD: usize = 32;

/// Returns the approximate size of a string: constant overhead plus its
/// byte length.
#[must_use]
pub fn string_size(s: &str) -> usize {
    STRING_OVERHEAD + s.len()
}

/// Returns the approximate deep size of a JSON value.
///
/// Null costs nothing, scalars a fixed amount, strings per [`string_size`],
/// and containers a fixed overhead plus the sum of their members (object
/// keys counted as strings).
#[must_use]
pub fn value_size(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => SCALAR_SIZE,
        Value::String(s) => string_size(s),
        Value::Array(items) => {
            CONTAINER_OVERHEAD + items.iter().map(value_size).sum::<usize>()
        }
        Value::Object(members) => {
            CONTAINER_OVERHEAD
                + members
                    .iter()
                    .map(|(k, v)| string_size(k) + value_size(v))
                    .sum::<usize>()
        }
    }
}

/// Returns the approximate cost of one stored entry: key plus value.
#[must_use]
pub fn entry_size(key: &str, value: &Value) -> usize {
    string_size(key) + value_size(value)
}

/// Formats a byte count for humans, e.g. `"1.5 MB"`.
#[must_use]
pub fn humanize_bytes(n: usize) -> String {
    let mut size = n as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
