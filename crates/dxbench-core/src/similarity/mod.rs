//! Semantic similarity between predicted and ground-truth diagnosis terms.

pub mod embedding;
pub mod lexical;

pub use embedding::EmbeddingSimilarity;
pub use lexical::LexicalSimilarity;

use anyhow::bail;
use async_trait::async_trait;

/// Scores how close a predicted diagnosis term is to a ground-truth label,
/// in `[0.0, 1.0]`.
#[async_trait]
pub trait SimilarityEstimator: Send + Sync {
    async fn score(&self, prediction: &str, truth: &str) -> anyhow::Result<f64>;

    /// Identifier recorded alongside scores, e.g. `embedding/text-embedding-3-small`.
    fn backend_id(&self) -> String;
}

/// Cosine similarity of two embedding vectors, clamped to `[0.0, 1.0]`.
/// A zero-norm vector scores 0.0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> anyhow::Result<f64> {
    if a.len() != b.len() {
        bail!("embedding dimension mismatch: {} vs {}", a.len(), b.len());
    }
    if a.is_empty() {
        bail!("cannot compare empty embeddings");
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0))
}
