//! Per-job retry state machine.
//!
//! Each attempt ends in exactly one outcome; the policy maps (attempt number,
//! outcome) to the next transition. Transient failures back off with
//! exponential delay plus jitter until the attempt budget runs out; fatal
//! failures and successes finish immediately. A server-provided Retry-After
//! hint overrides the computed delay.

use crate::config::BackoffConfig;
use crate::errors::InferError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Transient(InferError),
    Fatal(InferError),
}

impl From<InferError> for AttemptOutcome {
    fn from(e: InferError) -> Self {
        if e.is_transient() {
            AttemptOutcome::Transient(e)
        } else {
            AttemptOutcome::Fatal(e)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTransition {
    /// The job is done; record whatever the outcome was.
    Finish,
    /// Sleep, then run the next attempt.
    Backoff(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first.
    max_attempts: u32,
    backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Decide what happens after attempt number `attempt` (1-based) ended in
    /// `outcome`.
    pub fn advance(&self, attempt: u32, outcome: &AttemptOutcome) -> JobTransition {
        match outcome {
            AttemptOutcome::Success | AttemptOutcome::Fatal(_) => JobTransition::Finish,
            AttemptOutcome::Transient(_) if attempt >= self.max_attempts => JobTransition::Finish,
            AttemptOutcome::Transient(e) => {
                JobTransition::Backoff(e.retry_after().unwrap_or_else(|| self.delay(attempt)))
            }
        }
    }

    /// Exponential delay for the attempt that just failed, capped, with up
    /// to 25% additive jitter.
    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let exp = self.backoff.base_ms.saturating_mul(1u64 << shift);
        let capped = exp.min(self.backoff.cap_ms);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4);
        Duration::from_millis(capped + jitter)
    }
}
