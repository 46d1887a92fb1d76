//! Chat-completion providers that turn a case into a raw model reply.

pub mod fake;
pub mod openai;

pub use fake::FakeProvider;
pub use openai::OpenAIProvider;

use crate::errors::InferError;
use crate::model::Case;
use async_trait::async_trait;

/// A single inference attempt against one model. Implementations are shared
/// across the worker pool, so they must be internally synchronized.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Ask `model` for a differential diagnosis of `case`, returning the raw
    /// completion text.
    async fn infer(&self, case: &Case, model: &str) -> Result<String, InferError>;

    fn provider_name(&self) -> &'static str;
}
