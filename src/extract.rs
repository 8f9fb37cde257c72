use serde_json::Value;

use crate::jsonpath::{is_empty_value, value_to_text, JsonPathLib, PathError, PathEvaluator};
use crate::model::{ExtractResult, ExtractSpec, Vars};

pub fn apply(body: &[u8], rules: &ExtractSpec) -> (Vars, Vec<ExtractResult>) {
    apply_with(&JsonPathLib, body, rules)
}

/// Runs every rule against `body`. Results come back sorted by variable
/// name; failed rules produce a result but never a variable.
pub fn apply_with(
    evaluator: &dyn PathEvaluator,
    body: &[u8],
    rules: &ExtractSpec,
) -> (Vars, Vec<ExtractResult>) {
    let mut extracted = Vars::new();
    if rules.is_empty() {
        return (extracted, Vec::new());
    }

    // ExtractSpec is ordered, so iteration is already by variable name.
    let document = match serde_json::from_slice::<Value>(body) {
        Ok(document) => document,
        Err(_) => {
            let results = rules
                .iter()
                .map(|(name, expr)| {
                    failure(
                        name,
                        format!(
                            "extract {name:?} ({}): response body is not valid JSON",
                            expr.trim()
                        ),
                    )
                })
                .collect();
            return (extracted, results);
        }
    };

    let mut results = Vec::with_capacity(rules.len());
    for (name, expr) in rules {
        let expr = expr.trim();
        if expr.is_empty() {
            results.push(failure(name, format!("extract {name:?}: empty jsonpath expression")));
            continue;
        }

        let value = match evaluator.evaluate(expr, &document) {
            Ok(Some(value)) if !is_empty_value(&value) => value,
            Ok(_) => {
                results.push(failure(
                    name,
                    format!("extract {name:?} ({expr}): no value found"),
                ));
                continue;
            }
            Err(PathError::Empty) => {
                results.push(failure(name, format!("extract {name:?}: empty jsonpath expression")));
                continue;
            }
            Err(err) => {
                results.push(failure(
                    name,
                    format!("extract {name:?} ({expr}): jsonpath error: {err}"),
                ));
                continue;
            }
        };

        match to_variable(&value) {
            Some(text) => {
                extracted.insert(name.clone(), text);
                results.push(ExtractResult {
                    name: name.clone(),
                    success: true,
                    message: format!("extracted {name:?}"),
                });
            }
            None => results.push(failure(
                name,
                format!("extract {name:?} ({expr}): cannot convert value to string"),
            )),
        }
    }

    (extracted, results)
}

/// A single-element array stands for its element.
fn to_variable(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) if items.len() == 1 => to_variable(&items[0]),
        other => value_to_text(other),
    }
}

fn failure(name: &str, message: String) -> ExtractResult {
    ExtractResult {
        name: name.to_string(),
        success: false,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules(pairs: &[(&str, &str)]) -> ExtractSpec {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn results_are_sorted_and_empty_expressions_fail() {
        let (vars, results) = apply(
            br#"{"name":"alice"}"#,
            &rules(&[("bbb", ""), ("aaa", "$.name")]),
        );

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["aaa", "bbb"]);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].message.contains("empty jsonpath expression"));
        assert_eq!(vars.get("aaa").map(String::as_str), Some("alice"));
        assert!(!vars.contains_key("bbb"));
    }

    #[test]
    fn single_element_arrays_unwrap() {
        let body = br#"{"items":["single"],"wrapped":[["x"]]}"#;
        let (vars, _) = apply(body, &rules(&[("first", "$.items[0]"), ("all", "$.items")]));
        assert_eq!(vars["first"], "single");
        assert_eq!(vars["all"], "single");
    }

    #[test]
    fn containers_serialize_to_compact_json() {
        let body = br#"{"ids":[1,2],"user":{"id":7}}"#;
        let (vars, _) = apply(body, &rules(&[("ids", "$.ids"), ("user", "$.user")]));
        assert_eq!(vars["ids"], "[1,2]");
        assert_eq!(vars["user"], r#"{"id":7}"#);
    }

    #[test]
    fn empty_values_are_not_extracted() {
        let body = br#"{"blank":"","none":null,"list":[],"obj":{}}"#;
        let spec = rules(&[
            ("blank", "$.blank"),
            ("none", "$.none"),
            ("list", "$.list"),
            ("obj", "$.obj"),
            ("gone", "$.gone"),
        ]);

        let (vars, results) = apply(body, &spec);

        assert!(vars.is_empty());
        assert_eq!(results.len(), 5);
        for result in results {
            assert!(!result.success);
            assert!(result.message.contains("no value found"), "{}", result.message);
        }
    }

    #[test]
    fn non_json_body_fails_every_rule() {
        let (vars, results) = apply(b"not json", &rules(&[("a", "$.a"), ("b", "$.b")]));
        assert!(vars.is_empty());
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| !r.success && r.message.contains("not valid JSON")));
    }

    #[test]
    fn scalars_stringify() {
        let body = br#"{"n":3,"f":1.5,"ok":true}"#;
        let (vars, _) = apply(body, &rules(&[("n", "$.n"), ("f", "$.f"), ("ok", "$.ok")]));
        assert_eq!(vars["n"], "3");
        assert_eq!(vars["f"], "1.5");
        assert_eq!(vars["ok"], "true");
    }
}
