use std::{borrow::Cow, collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::error::{Error, ErrorKind};

use super::{Method, RequestSpec, Vars};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl AssertionResult {
    pub fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractResult {
    pub name: String,
    pub success: bool,
    pub message: String,
}

/// Bounded view of a response. Header names are stored in `Title-Case`, with
/// repeated headers grouped under one name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseSnapshot {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Vec<u8>,
    pub truncated: bool,
}

impl ResponseSnapshot {
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

// Bodies are stored as text when they are valid UTF-8 and hex-encoded otherwise.
impl Serialize for ResponseSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (body, encoding) = match std::str::from_utf8(&self.body) {
            Ok(text) => (Cow::Borrowed(text), "utf8"),
            Err(_) => (Cow::Owned(hex::encode(&self.body)), "hex"),
        };
        let mut state = serializer.serialize_struct("ResponseSnapshot", 4)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("body", &body)?;
        state.serialize_field("body_encoding", encoding)?;
        state.serialize_field("truncated", &self.truncated)?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    Canceled,
    Timeout,
    Dns,
    Connection,
    /// Reserved: a non-2xx status is recorded as data, never as an error.
    Http,
    InvalidConfig,
    MissingVariable,
    Unknown,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunErrorKind::Canceled => "canceled",
            RunErrorKind::Timeout => "timeout",
            RunErrorKind::Dns => "dns",
            RunErrorKind::Connection => "connection",
            RunErrorKind::Http => "http",
            RunErrorKind::InvalidConfig => "invalid_config",
            RunErrorKind::MissingVariable => "missing_variable",
            RunErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
}

impl RunError {
    pub fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        let kind = match err {
            Error::DeadlineExceeded => RunErrorKind::Timeout,
            _ => match err.kind() {
                ErrorKind::InvalidConfig | ErrorKind::NotFound => RunErrorKind::InvalidConfig,
                ErrorKind::MissingVariable => RunErrorKind::MissingVariable,
                ErrorKind::Canceled => RunErrorKind::Canceled,
                ErrorKind::Execution => RunErrorKind::Unknown,
            },
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResult {
    pub name: String,
    pub method: Method,
    pub url: String,
    /// Zero when no response was received.
    pub status_code: u16,
    pub latency_ms: u64,
    pub assertions: Vec<AssertionResult>,
    pub extracts: Vec<ExtractResult>,
    pub extracted: Vars,
    pub response: ResponseSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RequestResult {
    /// Empty result for a request that is about to be sent.
    pub fn pending(request: &RequestSpec) -> Self {
        Self {
            name: request.name.clone(),
            method: request.method,
            url: request.url.clone(),
            status_code: 0,
            latency_ms: 0,
            assertions: Vec::new(),
            extracts: Vec::new(),
            extracted: Vars::new(),
            response: ResponseSnapshot::default(),
            error: None,
        }
    }

    /// Result for a request that never reached the transport.
    pub fn failed(request: &RequestSpec, err: &Error) -> Self {
        Self {
            error: Some(RunError::from_error(err)),
            ..Self::pending(request)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
            || self.assertions.iter().any(|a| !a.passed)
            || self.extracts.iter().any(|e| !e.success)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub collection_name: String,
    pub collection_path: String,
    pub environment_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub results: Vec<RequestResult>,
}

impl RunResult {
    pub fn start(
        collection_name: impl Into<String>,
        collection_path: impl Into<String>,
        environment_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            collection_name: collection_name.into(),
            collection_path: collection_path.into(),
            environment_name: environment_name.into(),
            started_at: now,
            ended_at: now,
            results: Vec::with_capacity(capacity),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }
}

/// A run as persisted: masked (when enabled) and tagged with its store id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunArtifact {
    pub id: String,
    #[serde(flatten)]
    pub run: RunResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;
    use serde_json::json;

    #[test]
    fn run_error_maps_config_failures() {
        let missing = Error::MissingVariable("token".into()).in_field("request.url");
        assert_eq!(
            RunError::from_error(&missing).kind,
            RunErrorKind::MissingVariable
        );
        let invalid = Error::invalid("unclosed placeholder");
        assert_eq!(
            RunError::from_error(&invalid).kind,
            RunErrorKind::InvalidConfig
        );
        assert_eq!(
            RunError::from_error(&Error::DeadlineExceeded).kind,
            RunErrorKind::Timeout
        );
    }

    #[test]
    fn snapshot_serializes_binary_bodies_as_hex() {
        let snapshot = ResponseSnapshot {
            headers: BTreeMap::new(),
            body: vec![0, 159, 146, 150],
            truncated: false,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["body"], json!("009f9296"));
        assert_eq!(value["body_encoding"], json!("hex"));
    }

    #[test]
    fn request_result_omits_absent_error() {
        let spec = RequestSpec::new("ping", Method::Get, "http://localhost/ping");
        let value = serde_json::to_value(RequestResult::pending(&spec)).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["method"], json!("GET"));
        assert_eq!(value["status_code"], json!(0));
    }
}
