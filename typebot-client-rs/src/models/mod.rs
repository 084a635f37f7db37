//! Typebot API payload types.

pub mod bot;
pub mod chat;
pub mod result;
pub mod workspace;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Unwrap a `{"<key>": {...}}` envelope, returning the body unchanged when
/// the instance answers with the bare object instead. `{"<key>": null}`
/// unwraps to `null`.
pub(crate) fn unwrap_envelope(mut value: serde_json::Value, key: &str) -> serde_json::Value {
    match value.get_mut(key) {
        Some(inner) if inner.is_object() || inner.is_null() => inner.take(),
        _ => value,
    }
}

/// Parse a listing response that is either a bare JSON array or an object
/// holding the array under `key` (e.g. `{"typebots": [...]}`).
pub(crate) fn parse_listing<T: DeserializeOwned>(
    value: serde_json::Value,
    key: &str,
) -> Result<Vec<T>> {
    let items = match value {
        serde_json::Value::Array(items) => serde_json::Value::Array(items),
        serde_json::Value::Object(mut map) => match map.remove(key) {
            Some(items) => items,
            None => return Ok(Vec::new()),
        },
        other => {
            return Err(Error::Decode(format!(
                "expected a list of {} but got {}",
                key, other
            )))
        }
    };
    Ok(serde_json::from_value(items)?)
}
