use regex::Regex;
use serde_json::Value;

use crate::jsonpath::{
    is_empty_value, value_to_f64, value_to_text, JsonPathLib, PathError, PathEvaluator,
};
use crate::model::{AssertionResult, AssertionsSpec, JsonPathCheck};

pub const STATUS: &str = "status";
pub const MAX_LATENCY: &str = "max_ms";
pub const JSONPATH_EXISTS: &str = "jsonpath.exists";
pub const JSONPATH_EQ: &str = "jsonpath.eq";
pub const JSONPATH_CONTAINS: &str = "jsonpath.contains";
pub const JSONPATH_MATCHES: &str = "jsonpath.matches";
pub const JSONPATH_GT: &str = "jsonpath.gt";
pub const JSONPATH_LT: &str = "jsonpath.lt";

const NOT_JSON: &str = "response body is not valid JSON";

pub fn status(expected: u16, got: u16) -> AssertionResult {
    if expected == got {
        AssertionResult::pass(STATUS, format!("status {got}"))
    } else {
        AssertionResult::fail(STATUS, format!("expected status {expected}, got {got}"))
    }
}

/// Inclusive: a latency equal to the threshold passes.
pub fn max_latency(max_ms: u64, latency_ms: u64) -> AssertionResult {
    if latency_ms <= max_ms {
        AssertionResult::pass(MAX_LATENCY, format!("latency {latency_ms}ms <= {max_ms}ms"))
    } else {
        AssertionResult::fail(
            MAX_LATENCY,
            format!("expected latency <= {max_ms}ms, got {latency_ms}ms"),
        )
    }
}

pub fn evaluate(
    spec: &AssertionsSpec,
    status_code: u16,
    latency_ms: u64,
    body: &[u8],
) -> Vec<AssertionResult> {
    evaluate_with(&JsonPathLib, spec, status_code, latency_ms, body)
}

/// Status first, then latency, then every JSONPath rule. Expressions are
/// visited in sorted order; checks on one expression run in the fixed order
/// exists, eq, contains, matches, gt, lt.
pub fn evaluate_with(
    evaluator: &dyn PathEvaluator,
    spec: &AssertionsSpec,
    status_code: u16,
    latency_ms: u64,
    body: &[u8],
) -> Vec<AssertionResult> {
    let mut out = Vec::new();
    if let Some(expected) = spec.status {
        out.push(status(expected, status_code));
    }
    if let Some(max_ms) = spec.max_latency_ms {
        out.push(max_latency(max_ms, latency_ms));
    }
    if spec.jsonpath.is_empty() {
        return out;
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(document) => {
            for (expression, check) in &spec.jsonpath {
                let lookup = Lookup::from(evaluator.evaluate(expression, &document));
                out.extend(jsonpath_checks(expression, check, &lookup));
            }
        }
        Err(_) => {
            let lookup = Lookup::Failed(NOT_JSON.to_string());
            for (expression, check) in &spec.jsonpath {
                out.extend(jsonpath_checks(expression, check, &lookup));
            }
        }
    }
    out
}

enum Lookup {
    Found(Value),
    Missing,
    Failed(String),
}

impl From<Result<Option<Value>, PathError>> for Lookup {
    fn from(result: Result<Option<Value>, PathError>) -> Self {
        match result {
            Ok(Some(value)) => Lookup::Found(value),
            Ok(None) => Lookup::Missing,
            Err(err) => Lookup::Failed(err.to_string()),
        }
    }
}

impl Lookup {
    fn text(&self) -> Result<String, String> {
        match self {
            Lookup::Found(value) => value_to_text(value).ok_or_else(|| "value is null".to_string()),
            Lookup::Missing => Err("no value found".to_string()),
            Lookup::Failed(reason) => Err(reason.clone()),
        }
    }

    fn number(&self) -> Result<f64, String> {
        match self {
            Lookup::Found(value) => {
                value_to_f64(value).ok_or_else(|| format!("value {value} is not numeric"))
            }
            Lookup::Missing => Err("no value found".to_string()),
            Lookup::Failed(reason) => Err(reason.clone()),
        }
    }
}

fn jsonpath_checks(expr: &str, check: &JsonPathCheck, lookup: &Lookup) -> Vec<AssertionResult> {
    let mut out = Vec::new();
    if check.exists {
        out.push(check_exists(expr, lookup));
    }
    if let Some(expected) = &check.eq {
        out.push(check_text(expr, JSONPATH_EQ, lookup, |s| {
            if s == expected.as_str() {
                Ok(format!("jsonpath {expr:?} eq {expected:?}"))
            } else {
                Err(format!("expected {expected:?}, got {s:?}"))
            }
        }));
    }
    if let Some(needle) = &check.contains {
        out.push(check_text(expr, JSONPATH_CONTAINS, lookup, |s| {
            if s.contains(needle.as_str()) {
                Ok(format!("jsonpath {expr:?} contains {needle:?}"))
            } else {
                Err(format!("{s:?} does not contain {needle:?}"))
            }
        }));
    }
    if let Some(pattern) = &check.matches {
        out.push(check_text(expr, JSONPATH_MATCHES, lookup, |s| {
            let re = Regex::new(pattern)
                .map_err(|err| format!("invalid regex {pattern:?}: {err}"))?;
            if re.is_match(s) {
                Ok(format!("jsonpath {expr:?} matches {pattern:?}"))
            } else {
                Err(format!("{s:?} does not match {pattern:?}"))
            }
        }));
    }
    if let Some(threshold) = check.gt {
        out.push(check_number(expr, JSONPATH_GT, lookup, |n| {
            if n > threshold {
                Ok(format!("jsonpath {expr:?}: {n} > {threshold}"))
            } else {
                Err(format!("expected > {threshold}, got {n}"))
            }
        }));
    }
    if let Some(threshold) = check.lt {
        out.push(check_number(expr, JSONPATH_LT, lookup, |n| {
            if n < threshold {
                Ok(format!("jsonpath {expr:?}: {n} < {threshold}"))
            } else {
                Err(format!("expected < {threshold}, got {n}"))
            }
        }));
    }
    out
}

fn check_exists(expr: &str, lookup: &Lookup) -> AssertionResult {
    match lookup {
        Lookup::Failed(reason) => {
            AssertionResult::fail(JSONPATH_EXISTS, format!("jsonpath {expr:?}: {reason}"))
        }
        Lookup::Found(value) if !is_empty_value(value) => {
            AssertionResult::pass(JSONPATH_EXISTS, format!("jsonpath {expr:?} exists"))
        }
        _ => AssertionResult::fail(
            JSONPATH_EXISTS,
            format!("jsonpath {expr:?}: expected value to exist, got empty"),
        ),
    }
}

fn check_text(
    expr: &str,
    name: &str,
    lookup: &Lookup,
    compare: impl FnOnce(&str) -> Result<String, String>,
) -> AssertionResult {
    let outcome = lookup.text().and_then(|text| compare(&text));
    finish(expr, name, outcome)
}

fn check_number(
    expr: &str,
    name: &str,
    lookup: &Lookup,
    compare: impl FnOnce(f64) -> Result<String, String>,
) -> AssertionResult {
    let outcome = lookup.number().and_then(compare);
    finish(expr, name, outcome)
}

fn finish(expr: &str, name: &str, outcome: Result<String, String>) -> AssertionResult {
    match outcome {
        Ok(message) => AssertionResult::pass(name, message),
        Err(reason) => AssertionResult::fail(name, format!("jsonpath {expr:?}: {reason}")),
    }
}
