use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::Vars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let upper = value.trim().to_ascii_uppercase();
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == upper)
            .ok_or_else(|| Error::invalid(format!("unsupported method {value:?}")))
    }
}

pub type Headers = BTreeMap<String, String>;

/// Request payload. Exactly one encoding is active at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyContent {
    #[default]
    None,
    Json(Map<String, Value>),
    Form(BTreeMap<String, String>),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBody {
    pub content: BodyContent,
    /// Overrides the default content type of the active encoding.
    pub content_type: Option<String>,
}

impl RequestBody {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn json(object: Map<String, Value>) -> Self {
        Self {
            content: BodyContent::Json(object),
            content_type: None,
        }
    }

    pub fn form(fields: BTreeMap<String, String>) -> Self {
        Self {
            content: BodyContent::Form(fields),
            content_type: None,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            content: BodyContent::Raw(text.into()),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Checks evaluated against the value a JSONPath expression resolves to.
/// Unset fields are skipped.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonPathCheck {
    pub exists: bool,
    pub eq: Option<String>,
    pub contains: Option<String>,
    pub matches: Option<String>,
    pub gt: Option<f64>,
    pub lt: Option<f64>,
}

impl JsonPathCheck {
    pub fn is_empty(&self) -> bool {
        !self.exists
            && self.eq.is_none()
            && self.contains.is_none()
            && self.matches.is_none()
            && self.gt.is_none()
            && self.lt.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssertionsSpec {
    pub status: Option<u16>,
    pub max_latency_ms: Option<u64>,
    pub jsonpath: BTreeMap<String, JsonPathCheck>,
}

/// Variable name to JSONPath expression.
pub type ExtractSpec = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub name: String,
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: RequestBody,
    pub assertions: AssertionsSpec,
    pub extract: ExtractSpec,
}

impl RequestSpec {
    pub fn new(name: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url: url.into(),
            headers: Headers::new(),
            body: RequestBody::none(),
            assertions: AssertionsSpec::default(),
            extract: ExtractSpec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_extract(mut self, var: impl Into<String>, expression: impl Into<String>) -> Self {
        self.extract.insert(var.into(), expression.into());
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.assertions.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
    pub name: String,
    pub vars: Vars,
    pub requests: Vec<RequestSpec>,
}

/// A named variable set layered over a collection's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    pub name: String,
    pub vars: Vars,
}
