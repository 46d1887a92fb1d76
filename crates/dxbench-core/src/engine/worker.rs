//! One worker owns one job from first attempt to final outcome.

use super::retry::{AttemptOutcome, JobTransition, RetryPolicy};
use crate::errors::InferError;
use crate::model::{Case, InferenceJob, RawResponse, ResponseStatus};
use crate::providers::inference::InferenceProvider;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

pub(crate) struct Worker {
    provider: Arc<dyn InferenceProvider>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl Worker {
    pub(crate) fn new(
        provider: Arc<dyn InferenceProvider>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            retry,
            attempt_timeout,
        }
    }

    /// Drive one job to completion. Never errors: every failure mode folds
    /// into the returned response's status.
    pub(crate) async fn run(&self, job: InferenceJob, case: Arc<Case>) -> RawResponse {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let (outcome, text) = self.attempt(&case, &job.model).await;
            match self.retry.advance(attempt, &outcome) {
                JobTransition::Finish => return finish(job, outcome, text, attempt, started),
                JobTransition::Backoff(delay) => {
                    if let AttemptOutcome::Transient(e) = &outcome {
                        tracing::warn!(
                            case_id = %job.case_id,
                            model = %job.model,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            error = %e,
                            "inference attempt failed, backing off"
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, case: &Case, model: &str) -> (AttemptOutcome, String) {
        match timeout(self.attempt_timeout, self.provider.infer(case, model)).await {
            Ok(Ok(text)) => (AttemptOutcome::Success, text),
            Ok(Err(e)) => (AttemptOutcome::from(e), String::new()),
            Err(_) => (AttemptOutcome::from(InferError::Timeout), String::new()),
        }
    }
}

fn finish(
    job: InferenceJob,
    outcome: AttemptOutcome,
    text: String,
    attempts: u32,
    started: Instant,
) -> RawResponse {
    let duration_ms = started.elapsed().as_millis() as u64;
    match outcome {
        AttemptOutcome::Success => RawResponse {
            job,
            text,
            status: ResponseStatus::Ok,
            attempts,
            error: None,
            duration_ms,
        },
        AttemptOutcome::Transient(e) | AttemptOutcome::Fatal(e) => {
            tracing::error!(
                case_id = %job.case_id,
                model = %job.model,
                attempts,
                error = %e,
                "inference gave up on job"
            );
            RawResponse {
                job,
                text: String::new(),
                status: ResponseStatus::ProviderError,
                attempts,
                error: Some(e.to_string()),
                duration_ms,
            }
        }
    }
}
