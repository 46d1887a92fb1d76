//! Embedding-backed estimator: cosine similarity between term embeddings,
//! with per-run caching so each distinct term is embedded once.

use super::{cosine_similarity, SimilarityEstimator};
use crate::normalize::normalize_term;
use crate::providers::embedder::Embedder;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Cache key binding a term to the embedding model that produced its vector.
pub fn embed_cache_key(model_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

type Slot = Arc<OnceCell<Vec<f32>>>;

pub struct EmbeddingSimilarity {
    embedder: Arc<dyn Embedder>,
    cache: RwLock<HashMap<String, Slot>>,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn vector(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let key = embed_cache_key(&self.embedder.model_id(), text);
        let slot = self.slot(&key).await;
        let vector = slot
            .get_or_try_init(|| async { self.embedder.embed(text).await })
            .await?;
        Ok(vector.clone())
    }

    async fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.cache.read().await.get(key) {
            return slot.clone();
        }
        self.cache
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl SimilarityEstimator for EmbeddingSimilarity {
    async fn score(&self, prediction: &str, truth: &str) -> anyhow::Result<f64> {
        let a = self.vector(&normalize_term(prediction)).await?;
        let b = self.vector(&normalize_term(truth)).await?;
        cosine_similarity(&a, &b)
    }

    fn backend_id(&self) -> String {
        format!("embedding/{}", self.embedder.model_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::embedder::fake::FakeEmbedder;

    #[tokio::test]
    async fn identical_terms_score_one_with_a_single_embed_call() {
        let embedder = Arc::new(FakeEmbedder::new("fake-embed", vec![0.6, 0.8]));
        let sim = EmbeddingSimilarity::new(embedder.clone());

        let score = sim.score("Cholera", "cholera").await.unwrap();
        assert!((score - 1.0).abs() < 1e-9);
        // Normalization folds both spellings onto one cached vector.
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn orthogonal_embeddings_score_zero() {
        let embedder = Arc::new(
            FakeEmbedder::new("fake-embed", vec![1.0, 0.0])
                .with_vector("cholera", vec![1.0, 0.0])
                .with_vector("femoral neck fracture", vec![0.0, 1.0]),
        );
        let sim = EmbeddingSimilarity::new(embedder);

        let score = sim.score("Cholera", "Femoral neck fracture").await.unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn mismatched_dimensions_surface_as_errors() {
        let embedder = Arc::new(
            FakeEmbedder::new("fake-embed", vec![1.0, 0.0])
                .with_vector("cholera", vec![1.0, 0.0, 0.0]),
        );
        let sim = EmbeddingSimilarity::new(embedder);

        let err = sim.score("cholera", "giardiasis").await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn cache_key_depends_on_model_and_text() {
        let a = embed_cache_key("model-a", "cholera");
        let b = embed_cache_key("model-b", "cholera");
        let c = embed_cache_key("model-a", "giardiasis");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, embed_cache_key("model-a", "cholera"));
    }
}
