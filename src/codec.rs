//! JSON-string encoding of nested attribute values.
//!
//! The server stores only primitives and arrays as property values, so
//! object-valued attributes travel as JSON text and are decoded on the way
//! back. Decoding is best effort and never fails.

use serde_json::{Map, Value};

use crate::query::ParamMap;

/// Encodes one attribute value: objects become JSON strings, everything
/// else passes through.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

/// Encodes every value of an attribute bag.
pub fn encode_props(props: &Map<String, Value>) -> Map<String, Value> {
    props
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Encodes a parameter map before dispatch.
pub fn encode_params(params: &ParamMap) -> ParamMap {
    params
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decodes a string that looks like a JSON object literal. Anything else,
/// including arrays and malformed text, is returned unchanged.
pub fn try_parse_json(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    if !text.trim_start().starts_with('{') {
        return value.clone();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(parsed @ Value::Object(_)) => parsed,
        _ => value.clone(),
    }
}

/// Decodes every value of an attribute bag.
pub fn decode_props(props: &Map<String, Value>) -> Map<String, Value> {
    props
        .iter()
        .map(|(key, value)| (key.clone(), try_parse_json(value)))
        .collect()
}
