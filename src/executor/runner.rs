use std::{collections::BTreeMap, time::Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client, Response,
};

use crate::env::Resolver;
use crate::error::{Error, Result};
use crate::model::{BodyContent, Method, RequestResult, RequestSpec, RunError, Vars};
use crate::runner::RunContext;

use super::{classify::classify, models::DEFAULT_MAX_BODY_BYTES};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Resolves and sends one request.
///
/// `Err` is reserved for failures before the transport is involved
/// (resolution, URL or header construction). Transport failures, including a
/// run cancelled mid-flight, come back as a result carrying an error.
#[async_trait]
pub trait RequestRunner: Send + Sync {
    async fn run(&self, ctx: &RunContext, request: &RequestSpec, vars: &Vars)
        -> Result<RequestResult>;
}

#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: Client,
    max_body_bytes: usize,
    resolver: Resolver,
}

impl HttpRunner {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            resolver: Resolver::default(),
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    fn build(&self, request: &RequestSpec) -> Result<reqwest::RequestBuilder> {
        let url = reqwest::Url::parse(request.url.trim())
            .map_err(|err| Error::invalid(format!("invalid url {:?}: {err}", request.url)))?;

        let mut headers = HeaderMap::with_capacity(request.headers.len() + 1);
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|err| Error::invalid(format!("invalid header name {name:?}: {err}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|err| Error::invalid(format!("invalid value for header {name}: {err}")))?;
            headers.insert(header_name, header_value);
        }

        let (payload, default_type) = match &request.body.content {
            BodyContent::None => (None, None),
            BodyContent::Json(object) => (
                Some(serde_json::to_vec(object)?),
                Some(JSON_CONTENT_TYPE),
            ),
            BodyContent::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                (Some(encoded.into_bytes()), Some(FORM_CONTENT_TYPE))
            }
            BodyContent::Raw(text) => (Some(text.clone().into_bytes()), None),
        };

        // An explicit content type always wins; defaults never replace a
        // Content-Type header the request already sets.
        let content_type = match (&request.body.content_type, default_type) {
            (Some(explicit), _) if payload.is_some() => Some(explicit.as_str()),
            (_, Some(default)) if !headers.contains_key(CONTENT_TYPE) => Some(default),
            _ => None,
        };
        if let Some(content_type) = content_type {
            let value = HeaderValue::from_str(content_type).map_err(|err| {
                Error::invalid(format!("invalid content type {content_type:?}: {err}"))
            })?;
            headers.insert(CONTENT_TYPE, value);
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url)
            .headers(headers);
        if let Some(payload) = payload {
            builder = builder.body(payload);
        }
        Ok(builder)
    }
}

#[async_trait]
impl RequestRunner for HttpRunner {
    async fn run(
        &self,
        ctx: &RunContext,
        request: &RequestSpec,
        vars: &Vars,
    ) -> Result<RequestResult> {
        let resolved = self.resolver.session(vars).resolve_request(request)?;
        let builder = self.build(&resolved)?;
        let mut result = RequestResult::pending(&resolved);

        let start = Instant::now();
        let sent = tokio::select! {
            biased;
            cause = ctx.done() => Err(cause),
            response = builder.send() => Ok(response),
        };
        result.latency_ms = elapsed_ms(start);

        let response = match sent {
            Err(cause) => {
                result.error = Some(RunError::from_error(&cause));
                return Ok(result);
            }
            Ok(Err(err)) => {
                result.error = Some(RunError::new(classify(&err), err.to_string()));
                return Ok(result);
            }
            Ok(Ok(response)) => response,
        };

        result.status_code = response.status().as_u16();
        result.response.headers = collect_headers(response.headers());

        let read = tokio::select! {
            biased;
            cause = ctx.done() => Err(cause),
            body = read_bounded(response, self.max_body_bytes) => Ok(body),
        };
        match read {
            Ok(Ok((body, truncated))) => {
                result.response.body = body;
                result.response.truncated = truncated;
            }
            Ok(Err(err)) => {
                result.error = Some(RunError::new(classify(&err), err.to_string()));
            }
            Err(cause) => result.error = Some(RunError::from_error(&cause)),
        }

        tracing::debug!(
            event = "request.sent",
            request = %result.name,
            method = %result.method,
            url = %result.url,
            status = result.status_code,
            latency_ms = result.latency_ms,
            bytes = result.response.body.len(),
            truncated = result.response.truncated
        );
        Ok(result)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Reads at most `limit` bytes regardless of the advertised length. The
/// flag is set when the body had more to give.
async fn read_bounded(
    response: Response,
    limit: usize,
) -> std::result::Result<(Vec<u8>, bool), reqwest::Error> {
    let capacity = response
        .content_length()
        .map(|len| usize::try_from(len).unwrap_or(limit).min(limit))
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = limit - body.len();
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Groups values per header, with names in `Title-Case`.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        out.entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
