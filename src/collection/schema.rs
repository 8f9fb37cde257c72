//! On-disk collection format and its mapping onto the in-memory model.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{
    AssertionsSpec, Collection, ExtractSpec, Headers, JsonPathCheck, Method, RequestBody,
    RequestSpec, Vars,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionFile {
    pub name: String,
    pub vars: BTreeMap<String, ScalarValue>,
    pub requests: Vec<RequestFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestFile {
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, ScalarValue>,
    pub json: Option<Map<String, Value>>,
    pub form: Option<BTreeMap<String, ScalarValue>>,
    pub raw: Option<String>,
    pub content_type: Option<String>,
    #[serde(rename = "assert")]
    pub assertions: Option<AssertFile>,
    pub extract: ExtractSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssertFile {
    pub status: Option<u16>,
    pub max_ms: Option<u64>,
    pub jsonpath: BTreeMap<String, JsonPathCheck>,
}

/// Vars and headers are strings, but YAML authors write `port: 8080` or
/// `debug: true`; those are accepted and kept as their literal text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    pub(crate) fn into_text(self) -> String {
        match self {
            ScalarValue::Text(text) => text,
            ScalarValue::Integer(n) => n.to_string(),
            ScalarValue::Float(n) => n.to_string(),
            ScalarValue::Bool(b) => b.to_string(),
        }
    }
}

fn texts(map: BTreeMap<String, ScalarValue>) -> BTreeMap<String, String> {
    map.into_iter().map(|(k, v)| (k, v.into_text())).collect()
}

impl CollectionFile {
    /// Validates the file and converts it into a [`Collection`]. Error
    /// messages name the offending field, e.g. `requests[1].url`.
    pub fn into_collection(self) -> Result<Collection> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid("name: collection name is required"));
        }

        let vars: Vars = texts(self.vars);
        let requests = self
            .requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| request.into_spec(index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Collection {
            name,
            vars,
            requests,
        })
    }
}

impl RequestFile {
    fn into_spec(self, index: usize) -> Result<RequestSpec> {
        let field = |name: &str| format!("requests[{index}].{name}");

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid(format!(
                "{}: request name is required",
                field("name")
            )));
        }
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::invalid(format!("{}: url is required", field("url"))));
        }
        let method: Method = self
            .method
            .parse()
            .map_err(|err| Error::invalid(format!("{}: {err}", field("method"))))?;

        let body_kinds = [
            self.json.is_some(),
            self.form.is_some(),
            self.raw.is_some(),
        ];
        if body_kinds.iter().filter(|set| **set).count() > 1 {
            return Err(Error::invalid(format!(
                "{}: only one of json, form or raw may be set",
                field("body")
            )));
        }

        let mut body = match (self.json, self.form, self.raw) {
            (Some(object), _, _) => RequestBody::json(object),
            (_, Some(fields), _) => RequestBody::form(texts(fields)),
            (_, _, Some(text)) => RequestBody::raw(text),
            _ => RequestBody::none(),
        };
        body.content_type = self
            .content_type
            .map(|ct| ct.trim().to_string())
            .filter(|ct| !ct.is_empty());

        let assertions = self
            .assertions
            .map(|spec| AssertionsSpec {
                status: spec.status,
                max_latency_ms: spec.max_ms,
                jsonpath: spec.jsonpath,
            })
            .unwrap_or_default();
        if let Some((expression, _)) = assertions
            .jsonpath
            .iter()
            .find(|(_, check)| check.is_empty())
        {
            return Err(Error::invalid(format!(
                "{}: no checks configured for {expression:?}",
                field("assert.jsonpath")
            )));
        }

        let headers: Headers = texts(self.headers);

        Ok(RequestSpec {
            name,
            method,
            url,
            headers,
            body,
            assertions,
            extract: self.extract,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::BodyContent;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Result<Collection> {
        let file: CollectionFile = serde_yaml::from_str(yaml).unwrap();
        file.into_collection()
    }

    #[test]
    fn maps_a_full_request() {
        let collection = parse(
            r#"
name: Demo
vars:
  base_url: http://localhost
  port: 8080
requests:
  - name: login
    method: post
    url: "{{base_url}}/login"
    headers:
      X-Trace: "{{$uuid}}"
    json:
      user: "{{user}}"
      remember: true
    content_type: application/vnd.api+json
    assert:
      status: 200
      max_ms: 500
      jsonpath:
        "$.token": { exists: true, matches: "^[a-z0-9]+$" }
        "$.expires": { gt: 0 }
    extract:
      auth.token: "$.token"
"#,
        )
        .unwrap();

        assert_eq!(collection.name, "Demo");
        assert_eq!(collection.vars["port"], "8080");
        let request = &collection.requests[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.headers["X-Trace"], "{{$uuid}}");
        assert!(matches!(request.body.content, BodyContent::Json(_)));
        assert_eq!(
            request.body.content_type.as_deref(),
            Some("application/vnd.api+json")
        );
        assert_eq!(request.assertions.status, Some(200));
        assert_eq!(request.assertions.max_latency_ms, Some(500));
        assert!(request.assertions.jsonpath["$.token"].exists);
        assert_eq!(request.assertions.jsonpath["$.expires"].gt, Some(0.0));
        assert_eq!(request.extract["auth.token"], "$.token");
    }

    #[test]
    fn validation_errors_name_the_field() {
        let cases = [
            ("requests: []", "name"),
            ("name: x\nrequests:\n  - method: GET\n    url: http://a", "requests[0].name"),
            (
                "name: x\nrequests:\n  - {name: a, method: GET, url: http://a}\n  - {name: b, method: GET}",
                "requests[1].url",
            ),
            (
                "name: x\nrequests:\n  - {name: a, method: TRACE, url: http://a}",
                "requests[0].method",
            ),
            (
                "name: x\nrequests:\n  - {name: a, method: POST, url: http://a, raw: x, form: {a: b}}",
                "requests[0].body",
            ),
            (
                "name: x\nrequests:\n  - name: a\n    method: GET\n    url: http://a\n    assert:\n      jsonpath:\n        \"$.id\": {}\n",
                "requests[0].assert.jsonpath",
            ),
        ];

        for (yaml, field) in cases {
            let err = parse(yaml).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig, "{yaml}");
            assert!(err.to_string().contains(field), "{err} should name {field}");
        }
    }

    #[test]
    fn requests_without_body_default_to_none() {
        let collection =
            parse("name: x\nrequests:\n  - {name: a, method: get, url: http://a}").unwrap();
        assert_eq!(collection.requests[0].body, RequestBody::none());
        assert!(collection.requests[0].extract.is_empty());
    }
}
