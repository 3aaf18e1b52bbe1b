//! Legacy/enveloped record classification and normalization.
//!
//! Two encodings share the wire:
//! - legacy: a flat object with an `event` field and no `data` field;
//! - enveloped: `{"event": ..., "data": <object or JSON text>}`.
//!
//! Both normalize to the legacy (flat) shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::scanner::parse_json;

pub const EVENT_FIELD: &str = "event";
pub const DATA_FIELD: &str = "data";

/// A parsed top-level object, tagged by wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEnvelope {
    Legacy(Map<String, Value>),
    Enveloped { event: Value, data: Value },
}

/// Canonical record handed to the caller: a flat object with an `event` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Map<String, Value>);

impl NormalizedRecord {
    /// The `event` value as text, when it is a string.
    pub fn event(&self) -> Option<&str> {
        self.0.get(EVENT_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for NormalizedRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Legacy iff the object has `event` and lacks `data`; everything else is
/// treated as an envelope.
pub fn classify(mut object: Map<String, Value>) -> ParsedEnvelope {
    if object.contains_key(EVENT_FIELD) && !object.contains_key(DATA_FIELD) {
        return ParsedEnvelope::Legacy(object);
    }

    ParsedEnvelope::Enveloped {
        event: object.remove(EVENT_FIELD).unwrap_or(Value::Null),
        data: object.remove(DATA_FIELD).unwrap_or(Value::Null),
    }
}

/// Rewrites an envelope into the flat record shape.
///
/// Payload fields are merged after `event` is set, so a payload-level
/// `event` replaces the envelope's.
pub fn normalize(envelope: ParsedEnvelope) -> NormalizedRecord {
    match envelope {
        ParsedEnvelope::Legacy(record) => NormalizedRecord(record),
        ParsedEnvelope::Enveloped { event, data } => {
            let mut record = Map::new();
            record.insert(EVENT_FIELD.to_owned(), event);
            for (key, value) in decode_payload(data) {
                record.insert(key, value);
            }
            NormalizedRecord(record)
        }
    }
}

pub fn normalize_object(object: Map<String, Value>) -> NormalizedRecord {
    normalize(classify(object))
}

fn decode_payload(data: Value) -> Map<String, Value> {
    match data {
        Value::Object(payload) => payload,
        Value::String(text) => match parse_json::<Value>(&text) {
            Ok(Value::Object(payload)) => payload,
            Ok(_) | Err(_) => {
                debug!(len = text.len(), "envelope data is not a JSON object; using empty payload");
                Map::new()
            }
        },
        Value::Null => Map::new(),
        other => {
            debug!(kind = value_kind(&other), "unsupported envelope data; using empty payload");
            Map::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
