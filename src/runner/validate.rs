use std::{fmt, path::Path, sync::Arc};

use serde::Serialize;

use crate::collection::CollectionLoader;
use crate::env::{EnvironmentLoader, Resolver};
use crate::error::{Error, ErrorKind, Result};
use crate::model::merge_vars;

use super::RunContext;

/// Stand-in value for variables that only exist once a request has run.
pub const EXTRACT_PLACEHOLDER: &str = "x";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub request: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {:?}: {}", self.request, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub collection_name: String,
    pub environment_name: String,
    pub requests: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Dry run of a collection: every request is resolved against the scope it
/// would see during a real run, without sending anything.
pub struct ValidateCollection {
    collections: Arc<dyn CollectionLoader>,
    environments: Arc<dyn EnvironmentLoader>,
    resolver: Resolver,
}

impl ValidateCollection {
    pub fn new(
        collections: Arc<dyn CollectionLoader>,
        environments: Arc<dyn EnvironmentLoader>,
    ) -> Self {
        Self {
            collections,
            environments,
            resolver: Resolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// `Err` when loading fails or the context stops; resolution problems are
    /// collected per request in the report.
    pub fn execute(
        &self,
        ctx: &RunContext,
        collection_path: &Path,
        environment: &str,
    ) -> Result<ValidationReport> {
        let collection = self.collections.load_collection(collection_path)?;
        let environment = self.environments.load_environment(environment)?;

        let mut scope = merge_vars(&collection.vars, &environment.vars);
        let mut issues = Vec::new();
        for request in &collection.requests {
            ctx.check()?;

            let resolved = self.resolver.session(&scope).resolve_request(request);
            if let Err(err) = resolved.and_then(|spec| check_url(&spec.url)) {
                issues.push(ValidationIssue {
                    request: request.name.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }

            // Extracted values are unknown until the request runs.
            for var in request.extract.keys() {
                scope
                    .entry(var.clone())
                    .or_insert_with(|| EXTRACT_PLACEHOLDER.to_string());
            }
        }

        tracing::info!(
            event = "validate.finished",
            collection = %collection.name,
            environment = %environment.name,
            issues = issues.len()
        );

        Ok(ValidationReport {
            collection_name: collection.name,
            environment_name: environment.name,
            requests: collection.requests.len(),
            issues,
        })
    }
}

fn check_url(url: &str) -> Result<()> {
    reqwest::Url::parse(url)
        .map(|_| ())
        .map_err(|err| Error::invalid(format!("invalid url {url:?}: {err}")).in_field("request.url"))
}
