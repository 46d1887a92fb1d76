use super::InferenceProvider;
use crate::errors::InferError;
use crate::model::Case;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable provider for tests. Each call pops the next scripted outcome;
/// when the script is exhausted the fallback outcome repeats forever.
/// Counters expose how the pool drove it: total calls, and the highest
/// number of attempts that were in flight at once.
#[derive(Clone)]
pub struct FakeProvider {
    fallback: Result<String, InferError>,
    script: Arc<Mutex<VecDeque<Result<String, InferError>>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn respond_with(text: &str) -> Self {
        Self::with_fallback(Ok(text.to_string()))
    }

    pub fn failing_with(error: InferError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<String, InferError>) -> Self {
        Self {
            fallback,
            script: Arc::new(Mutex::new(VecDeque::new())),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue one outcome ahead of the fallback. Outcomes are consumed in
    /// the order they were queued.
    #[must_use]
    pub fn with_attempt(self, outcome: Result<String, InferError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Hold every call open for `delay` before answering.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for FakeProvider {
    async fn infer(&self, _case: &Case, _model: &str) -> Result<String, InferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroundTruth;

    fn case() -> Case {
        Case {
            id: "c1".into(),
            narrative: "narrative".into(),
            images: vec![],
            ground_truth: vec![GroundTruth {
                code: "1A00".into(),
                label: "Cholera".into(),
                primary: true,
            }],
        }
    }

    #[tokio::test]
    async fn script_runs_before_fallback() {
        let provider = FakeProvider::respond_with("fallback")
            .with_attempt(Err(InferError::Timeout))
            .with_attempt(Ok("scripted".into()));

        assert!(provider.infer(&case(), "m").await.is_err());
        assert_eq!(provider.infer(&case(), "m").await.unwrap(), "scripted");
        assert_eq!(provider.infer(&case(), "m").await.unwrap(), "fallback");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn failing_fallback_repeats() {
        let provider = FakeProvider::failing_with(InferError::Server { status: 503 });
        for _ in 0..3 {
            assert!(matches!(
                provider.infer(&case(), "m").await,
                Err(InferError::Server { status: 503 })
            ));
        }
        assert_eq!(provider.calls(), 3);
    }
}
