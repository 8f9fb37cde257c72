use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::instrument::WithSubscriber;

use crate::assertions;
use crate::collection::CollectionLoader;
use crate::env::EnvironmentLoader;
use crate::error::{Error, Result};
use crate::executor::RequestRunner;
use crate::extract;
use crate::jsonpath::{JsonPathLib, PathEvaluator};
use crate::model::{merge_vars, RequestResult, RunResult};
use crate::store::ArtifactStore;

use super::{RunContext, RunHandle};

/// A finished (or stopped) run. `error` carries a cancellation or
/// persistence failure alongside whatever results were produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run: RunResult,
    pub run_id: Option<String>,
    pub error: Option<Error>,
}

impl RunOutcome {
    pub fn into_result(self) -> Result<(RunResult, Option<String>)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.run, self.run_id)),
        }
    }
}

/// Runs a collection's requests in order, threading extracted variables
/// from each request into the scope of the next.
pub struct RunCollection {
    collections: Arc<dyn CollectionLoader>,
    environments: Arc<dyn EnvironmentLoader>,
    runner: Arc<dyn RequestRunner>,
    store: Option<Arc<dyn ArtifactStore>>,
    evaluator: Arc<dyn PathEvaluator>,
}

impl RunCollection {
    pub fn new(
        collections: Arc<dyn CollectionLoader>,
        environments: Arc<dyn EnvironmentLoader>,
        runner: Arc<dyn RequestRunner>,
    ) -> Self {
        Self {
            collections,
            environments,
            runner,
            store: None,
            evaluator: Arc::new(JsonPathLib),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn PathEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// `Err` only when the collection or environment cannot be loaded; every
    /// later failure is reported through the outcome.
    pub async fn execute(
        &self,
        ctx: &RunContext,
        collection_path: &Path,
        environment: &str,
    ) -> Result<RunOutcome> {
        let collection = self.collections.load_collection(collection_path)?;
        let environment = self.environments.load_environment(environment)?;

        let mut scope = merge_vars(&collection.vars, &environment.vars);
        let mut run = RunResult::start(
            collection.name.clone(),
            collection_path.display().to_string(),
            environment.name.clone(),
            collection.requests.len(),
        );
        tracing::info!(
            event = "run.started",
            collection = %run.collection_name,
            environment = %run.environment_name,
            requests = collection.requests.len()
        );

        let mut error = None;
        for request in &collection.requests {
            if let Err(err) = ctx.check() {
                error = Some(err);
                break;
            }

            let result = match self.runner.run(ctx, request, &scope).await {
                Err(err) => RequestResult::failed(request, &err),
                Ok(mut result) => {
                    if result.error.is_none() {
                        result.assertions = assertions::evaluate_with(
                            self.evaluator.as_ref(),
                            &request.assertions,
                            result.status_code,
                            result.latency_ms,
                            &result.response.body,
                        );
                        let (extracted, extracts) = extract::apply_with(
                            self.evaluator.as_ref(),
                            &result.response.body,
                            &request.extract,
                        );
                        scope = merge_vars(&scope, &extracted);
                        result.extracted = extracted;
                        result.extracts = extracts;
                    }
                    result
                }
            };

            tracing::info!(
                event = "request.finished",
                request = %result.name,
                status = result.status_code,
                latency_ms = result.latency_ms,
                failed = result.is_failure(),
                error = result.error.as_ref().map(|e| e.kind.to_string()).as_deref()
            );
            run.results.push(result);
        }

        // Only a skipped request makes the run canceled; a signal that fires
        // after the last request finished is ignored.
        run.ended_at = Utc::now();

        if let Some(err) = &error {
            tracing::warn!(
                event = "run.canceled",
                collection = %run.collection_name,
                completed = run.results.len(),
                reason = %err
            );
            return Ok(RunOutcome {
                run,
                run_id: None,
                error,
            });
        }

        tracing::info!(
            event = "run.finished",
            collection = %run.collection_name,
            failures = run.failure_count()
        );

        let mut run_id = None;
        if let Some(store) = &self.store {
            match store.save_run(&run) {
                Ok(id) => run_id = Some(id),
                Err(err) => {
                    tracing::error!(event = "run.save_failed", error = %err);
                    error = Some(err);
                }
            }
        }

        Ok(RunOutcome { run, run_id, error })
    }

    /// Starts the run on a background task. The handle yields exactly one
    /// completion.
    pub fn spawn(
        self: Arc<Self>,
        ctx: RunContext,
        collection_path: PathBuf,
        environment: String,
    ) -> RunHandle {
        let (done_tx, done_rx) = oneshot::channel();
        let token = ctx.token().clone();
        tokio::spawn(
            async move {
                let outcome = self.execute(&ctx, &collection_path, &environment).await;
                // The receiver may have been dropped; nobody is waiting then.
                let _ = done_tx.send(outcome);
            }
            .with_current_subscriber(),
        );
        RunHandle::new(token, done_rx)
    }
}
