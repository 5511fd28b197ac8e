//! Normalization of list responses.
//!
//! The backend wraps collections differently depending on the endpoint:
//! `{ "personnel": [...] }`, `{ "deliveries": [...] }`, `{ "data": [...] }`
//! or a bare array. Every list response goes through [`normalize_list`]
//! before the rest of the service sees it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::courier::Courier;
use crate::models::delivery::Delivery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Personnel,
    Deliveries,
}

impl ListKind {
    pub fn key(self) -> &'static str {
        match self {
            ListKind::Personnel => "personnel",
            ListKind::Deliveries => "deliveries",
        }
    }
}

/// Envelope shapes the backend is known to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `{ "<resource>": [...] }`
    Keyed,
    /// `{ "data": [...] }`
    Data,
    /// `[...]`
    Bare,
    /// Anything that carries no array where one is expected.
    Unrecognised,
}

impl EnvelopeShape {
    pub fn detect(payload: &Value, kind: ListKind) -> Self {
        match payload {
            Value::Array(_) => EnvelopeShape::Bare,
            Value::Object(map) if map.get(kind.key()).is_some_and(Value::is_array) => {
                EnvelopeShape::Keyed
            }
            Value::Object(map) if map.get("data").is_some_and(Value::is_array) => {
                EnvelopeShape::Data
            }
            _ => EnvelopeShape::Unrecognised,
        }
    }

    /// Wraps `items` the way this shape would carry them.
    pub fn wrap<T: Serialize>(self, kind: ListKind, items: &[T]) -> Value {
        let list = serde_json::to_value(items).unwrap_or_else(|_| Value::Array(Vec::new()));
        match self {
            EnvelopeShape::Keyed => {
                let mut map = Map::new();
                map.insert(kind.key().to_string(), list);
                Value::Object(map)
            }
            EnvelopeShape::Data => {
                let mut map = Map::new();
                map.insert("data".to_string(), list);
                Value::Object(map)
            }
            EnvelopeShape::Bare => list,
            EnvelopeShape::Unrecognised => Value::Object(Map::new()),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("{kind} record at index {index} is malformed: {source}")]
    MalformedRecord {
        kind: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Extracts the record list from any accepted envelope.
///
/// A payload without a list yields an empty vector. A list containing a
/// record that cannot be decoded is rejected instead of silently dropped.
pub fn normalize_list<T: DeserializeOwned>(
    payload: Value,
    kind: ListKind,
) -> Result<Vec<T>, EnvelopeError> {
    let shape = EnvelopeShape::detect(&payload, kind);
    let items = match (shape, payload) {
        (EnvelopeShape::Bare, Value::Array(items)) => items,
        (EnvelopeShape::Keyed, Value::Object(mut map)) => take_array(&mut map, kind.key()),
        (EnvelopeShape::Data, Value::Object(mut map)) => take_array(&mut map, "data"),
        _ => {
            tracing::debug!(kind = kind.key(), "response carried no list; treating as empty");
            Vec::new()
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|source| EnvelopeError::MalformedRecord {
                kind: kind.key(),
                index,
                source,
            })
        })
        .collect()
}

pub fn normalize_personnel(payload: Value) -> Result<Vec<Courier>, EnvelopeError> {
    normalize_list(payload, ListKind::Personnel)
}

pub fn normalize_deliveries(payload: Value) -> Result<Vec<Delivery>, EnvelopeError> {
    normalize_list(payload, ListKind::Deliveries)
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
