//! Fans the case-by-model job matrix out over a bounded worker pool.
//!
//! Concurrency is governed by one counting semaphore: a permit is acquired
//! before each spawn and rides inside the task, so at most `max_workers`
//! provider calls are in flight regardless of how many jobs are queued.
//! Results are collected in completion order and sorted by (model, case)
//! for deterministic output.

use super::retry::RetryPolicy;
use super::worker::Worker;
use crate::config::RunConfig;
use crate::model::{Case, InferenceJob, RawResponse, ResponseStatus};
use crate::providers::inference::InferenceProvider;
use crate::report::progress::{ProgressEvent, ProgressSink};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct Dispatcher {
    provider: Arc<dyn InferenceProvider>,
    config: RunConfig,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn InferenceProvider>, config: RunConfig) -> Self {
        Self { provider, config }
    }

    /// Run every (case, model) job to completion. If `progress` is set, it
    /// is called after each job finishes.
    pub async fn run(
        &self,
        cases: &[Case],
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<Vec<RawResponse>> {
        self.config.validate()?;

        let worker = Arc::new(Worker::new(
            self.provider.clone(),
            RetryPolicy::new(self.config.max_retries, self.config.backoff),
            Duration::from_secs(self.config.timeout_seconds),
        ));
        let sem = Arc::new(Semaphore::new(self.config.max_workers));
        let mut join_set = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, InferenceJob> = HashMap::new();

        let total = cases.len() * self.config.models.len();
        tracing::info!(
            cases = cases.len(),
            models = self.config.models.len(),
            jobs = total,
            max_workers = self.config.max_workers,
            "dispatching evaluation jobs"
        );

        for model in &self.config.models {
            for case in cases {
                let job = InferenceJob {
                    case_id: case.id.clone(),
                    model: model.clone(),
                };
                let permit = sem.clone().acquire_owned().await?;
                let worker = worker.clone();
                let case = Arc::new(case.clone());
                let task_job = job.clone();
                let handle = join_set.spawn(async move {
                    let _permit = permit;
                    worker.run(task_job, case).await
                });
                pending.insert(handle.id(), job);
            }
        }

        let mut responses = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next_with_id().await {
            let response = match joined {
                Ok((id, response)) => {
                    pending.remove(&id);
                    response
                }
                Err(e) => {
                    // A panicked task still owes the run a row.
                    let job = pending.remove(&e.id()).unwrap_or_else(|| InferenceJob {
                        case_id: "unknown".into(),
                        model: "unknown".into(),
                    });
                    tracing::error!(
                        case_id = %job.case_id,
                        model = %job.model,
                        error = %e,
                        "inference task failed to join"
                    );
                    RawResponse {
                        job,
                        text: String::new(),
                        status: ResponseStatus::ProviderError,
                        attempts: 0,
                        error: Some(format!("join error: {e}")),
                        duration_ms: 0,
                    }
                }
            };
            responses.push(response);
            if let Some(ref sink) = progress {
                sink(ProgressEvent {
                    done: responses.len(),
                    total,
                });
            }
        }

        // Deterministic order for downstream artifacts.
        responses.sort_by(|a, b| {
            a.job
                .model
                .cmp(&b.job.model)
                .then_with(|| a.job.case_id.cmp(&b.job.case_id))
        });
        Ok(responses)
    }
}
