use super::Embedder;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic embedder for tests: per-text vectors from a table, with a
/// default for anything unlisted. Lookup keys are the exact embed inputs.
#[derive(Clone)]
pub struct FakeEmbedder {
    pub model: String,
    calls: Arc<AtomicUsize>,
    default: Vec<f32>,
    table: HashMap<String, Vec<f32>>,
}

impl FakeEmbedder {
    pub fn new(model: &str, default: Vec<f32>) -> Self {
        Self {
            model: model.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            default,
            table: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}
