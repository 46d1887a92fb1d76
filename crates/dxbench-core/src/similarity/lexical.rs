//! Edit-distance fallback estimator. No network, no model: useful for
//! offline runs and as the deterministic backend in tests.

use super::SimilarityEstimator;
use crate::normalize::normalize_term;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SimilarityEstimator for LexicalSimilarity {
    async fn score(&self, prediction: &str, truth: &str) -> anyhow::Result<f64> {
        Ok(strsim::jaro_winkler(
            &normalize_term(prediction),
            &normalize_term(truth),
        ))
    }

    fn backend_id(&self) -> String {
        "lexical/jaro-winkler".to_string()
    }
}
