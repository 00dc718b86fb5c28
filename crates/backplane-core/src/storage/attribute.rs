//! JSON <-> DynamoDB attribute-value codec.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};

use super::types::Record;
use crate::error::{BackplaneError, Result};

/// Encode a JSON value as a typed attribute value.
pub fn to_attribute(value: &Value) -> Value {
    let mut typed = Map::new();
    match value {
        Value::Null => typed.insert("NULL".into(), Value::Bool(true)),
        Value::Bool(b) => typed.insert("BOOL".into(), Value::Bool(*b)),
        Value::Number(n) => typed.insert("N".into(), Value::String(n.to_string())),
        Value::String(s) => typed.insert("S".into(), Value::String(s.clone())),
        Value::Array(items) => typed.insert(
            "L".into(),
            Value::Array(items.iter().map(to_attribute).collect()),
        ),
        Value::Object(fields) => typed.insert("M".into(), Value::Object(to_item(fields))),
    };
    Value::Object(typed)
}

/// Encode every field of a record.
pub fn to_item(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .map(|(field, value)| (field.clone(), to_attribute(value)))
        .collect()
}

fn parse_number(raw: &str) -> Result<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Value::Number(u.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| BackplaneError::Storage(format!("Invalid DynamoDB number: {}", raw)))
}

fn malformed(attribute: &Value) -> BackplaneError {
    BackplaneError::Storage(format!("Malformed DynamoDB attribute: {}", attribute))
}

fn string_list(values: &Value, attribute: &Value) -> Result<Vec<String>> {
    values
        .as_array()
        .ok_or_else(|| malformed(attribute))?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| malformed(attribute)))
        .collect()
}

/// Decode a typed attribute value into plain JSON.
///
/// Sets (`SS`, `NS`, `BS`) decode to arrays; binary (`B`) stays base64 text.
pub fn from_attribute(attribute: &Value) -> Result<Value> {
    let typed = attribute.as_object().ok_or_else(|| malformed(attribute))?;
    let (kind, inner) = typed.iter().next().ok_or_else(|| malformed(attribute))?;
    match kind.as_str() {
        "NULL" => Ok(Value::Null),
        "BOOL" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed(attribute)),
        "S" | "B" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(attribute)),
        "N" => parse_number(inner.as_str().ok_or_else(|| malformed(attribute))?),
        "L" => inner
            .as_array()
            .ok_or_else(|| malformed(attribute))?
            .iter()
            .map(from_attribute)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        "M" => from_item(inner.as_object().ok_or_else(|| malformed(attribute))?).map(Value::Object),
        "SS" | "BS" => Ok(Value::Array(
            string_list(inner, attribute)?
                .into_iter()
                .map(Value::String)
                .collect(),
        )),
        "NS" => string_list(inner, attribute)?
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Err(malformed(attribute)),
    }
}

/// Decode a whole item into a record.
pub fn from_item(item: &Map<String, Value>) -> Result<Record> {
    item.iter()
        .map(|(field, attribute)| Ok((field.clone(), from_attribute(attribute)?)))
        .collect()
}

/// Decode base64 binary attribute text, for callers that stored raw bytes.
pub fn decode_binary(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| BackplaneError::Storage(format!("Invalid binary attribute: {}", e)))
}
