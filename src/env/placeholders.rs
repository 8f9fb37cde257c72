use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{BodyContent, Headers, RequestBody, RequestSpec, Vars};

pub const TIMESTAMP_BUILTIN: &str = "$timestamp";
pub const UUID_BUILTIN: &str = "$uuid";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Creates resolution sessions. Holds the clock and id source used for builtins.
#[derive(Clone)]
pub struct Resolver {
    now: Clock,
    ids: IdGenerator,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            now: Arc::new(Utc::now),
            ids: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, now: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.now = Arc::new(now);
        self
    }

    pub fn with_ids(mut self, ids: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Starts a session: builtins are computed once here and reused by every
    /// placeholder resolved through it.
    pub fn session<'a>(&self, vars: &'a Vars) -> Session<'a> {
        Session {
            vars,
            timestamp: (self.now)().timestamp().to_string(),
            uuid: (self.ids)(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session<'a> {
    vars: &'a Vars,
    timestamp: String,
    uuid: String,
}

impl Session<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            TIMESTAMP_BUILTIN => Some(&self.timestamp),
            UUID_BUILTIN => Some(&self.uuid),
            _ => self.vars.get(name).map(String::as_str),
        }
    }

    pub fn resolve_str(&self, input: &str) -> Result<String> {
        if !input.contains("{{") {
            return Ok(input.to_string());
        }

        let mut output = String::with_capacity(input.len() + 16);
        let mut rest = input;
        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| Error::invalid(format!("unclosed placeholder in {input:?}")))?;

            let name = after[..end].trim();
            if name.is_empty() {
                return Err(Error::invalid(format!("empty placeholder in {input:?}")));
            }

            let value = self
                .lookup(name)
                .ok_or_else(|| Error::MissingVariable(name.to_string()))?;
            output.push_str(value);
            rest = &after[end + 2..];
        }
        output.push_str(rest);

        Ok(output)
    }

    pub fn resolve_headers(&self, headers: &Headers) -> Result<Headers> {
        headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.resolve_str(value)?)))
            .collect()
    }

    /// Substitutes string leaves only; numbers, booleans and nulls pass through.
    pub fn resolve_json(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(text) => Ok(Value::String(self.resolve_str(text)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_json(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_json(v)?)))
                .collect::<Result<serde_json::Map<_, _>>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve_body(&self, body: &RequestBody) -> Result<RequestBody> {
        let content = match &body.content {
            BodyContent::None => BodyContent::None,
            BodyContent::Json(object) => {
                let mut resolved = serde_json::Map::with_capacity(object.len());
                for (key, value) in object {
                    resolved.insert(key.clone(), self.resolve_json(value)?);
                }
                BodyContent::Json(resolved)
            }
            BodyContent::Form(fields) => BodyContent::Form(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_str(v)?)))
                    .collect::<Result<_>>()?,
            ),
            BodyContent::Raw(text) => BodyContent::Raw(self.resolve_str(text)?),
        };
        Ok(RequestBody {
            content,
            content_type: body.content_type.clone(),
        })
    }

    /// Resolves URL, headers and body into a new spec; the input is untouched.
    pub fn resolve_request(&self, request: &RequestSpec) -> Result<RequestSpec> {
        let url = self
            .resolve_str(&request.url)
            .map_err(|err| err.in_field("request.url"))?;
        let headers = self
            .resolve_headers(&request.headers)
            .map_err(|err| err.in_field("request.headers"))?;
        let body = self
            .resolve_body(&request.body)
            .map_err(|err| err.in_field("request.body"))?;

        Ok(RequestSpec {
            url,
            headers,
            body,
            ..request.clone()
        })
    }
}

/// One-off resolution with a fresh session.
pub fn expand_placeholders(input: &str, vars: &Vars) -> Result<String> {
    Resolver::default().session(vars).resolve_str(input)
}
