//! Path-expression evaluation over parsed JSON documents.
//!
//! The assertion and extraction engines only see [`PathEvaluator`]; the
//! default implementation is backed by `jsonpath_lib`.

use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty jsonpath expression")]
    Empty,
    #[error("invalid jsonpath {expression:?}: {reason}")]
    Invalid { expression: String, reason: String },
}

pub trait PathEvaluator: Send + Sync {
    /// `Ok(None)` when the expression is valid but matches nothing.
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, PathError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathLib;

impl PathEvaluator for JsonPathLib {
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, PathError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(PathError::Empty);
        }

        let matches =
            jsonpath_lib::select(document, expression).map_err(|err| PathError::Invalid {
                expression: expression.to_string(),
                reason: format!("{err:?}"),
            })?;

        // One match is returned as-is; several are collected into an array.
        match matches.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some((*single).clone())),
            many => Ok(Some(Value::Array(
                many.iter().map(|value| (*value).clone()).collect(),
            ))),
        }
    }
}

/// True for null, empty strings, empty arrays and empty objects.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Shortest decimal form: `2.0` renders as `2`, `0.5` as `0.5`.
pub fn format_number(number: &Number) -> String {
    if let Some(n) = number.as_i64() {
        return n.to_string();
    }
    if let Some(n) = number.as_u64() {
        return n.to_string();
    }
    match number.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Some(n) => n.to_string(),
        None => number.to_string(),
    }
}

/// Text form used for comparisons and extracted variables. Containers become
/// compact JSON; `None` means there is no text (null).
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(format_number(n)),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

/// Numeric view of a value; numeric strings are accepted.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
