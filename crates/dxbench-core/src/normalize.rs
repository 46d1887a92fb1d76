//! Diagnosis-term normalization with a per-run resolution cache.
//!
//! Free-text guesses repeat across cases and models, so every ICD-11 lookup
//! goes through [`DiagnosisNormalizer`]: terms are canonicalized to a cache
//! key, concurrent lookups for the same key collapse into one resolver call,
//! and definitive outcomes (including "no match") are cached for the rest of
//! the run. Resolver errors are never cached; the next caller retries.

use crate::model::IcdMatch;
use crate::providers::resolver::CodeResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Canonical cache key for a diagnosis term: lowercase, interior whitespace
/// collapsed to single spaces.
pub fn normalize_term(term: &str) -> String {
    term.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

type Slot = Arc<OnceCell<Option<IcdMatch>>>;

pub struct DiagnosisNormalizer {
    resolver: Arc<dyn CodeResolver>,
    cache: RwLock<HashMap<String, Slot>>,
}

impl DiagnosisNormalizer {
    pub fn new(resolver: Arc<dyn CodeResolver>) -> Self {
        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a free-text diagnosis to its ICD-11 match, consulting the
    /// cache first. `Ok(None)` means the terminology has no entry for the
    /// term; that outcome is cached like a hit.
    pub async fn resolve(&self, term: &str) -> anyhow::Result<Option<IcdMatch>> {
        let key = normalize_term(term);
        if key.is_empty() {
            return Ok(None);
        }
        let slot = self.slot(&key).await;
        let resolved = slot
            .get_or_try_init(|| async {
                tracing::debug!(term = %key, "resolving diagnosis code");
                self.resolver.resolve(&key).await
            })
            .await?;
        Ok(resolved.clone())
    }

    /// Number of distinct terms seen so far.
    pub async fn cached_terms(&self) -> usize {
        self.cache.read().await.len()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::resolver::fake::FakeResolver;

    #[test]
    fn normalization_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_term("  Acute   Myocardial\tInfarction "), "acute myocardial infarction");
        assert_eq!(normalize_term(""), "");
        assert_eq!(normalize_term("   "), "");
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let resolver = Arc::new(FakeResolver::new().with_entry("cholera", "1A00", "Cholera"));
        let normalizer = DiagnosisNormalizer::new(resolver.clone());

        let first = normalizer.resolve("Cholera").await.unwrap().unwrap();
        let second = normalizer.resolve("Cholera").await.unwrap().unwrap();
        assert_eq!(first.code, "1A00");
        assert_eq!(second.code, "1A00");
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn case_and_spacing_variants_share_one_entry() {
        let resolver = Arc::new(FakeResolver::new().with_entry("cholera", "1A00", "Cholera"));
        let normalizer = DiagnosisNormalizer::new(resolver.clone());

        normalizer.resolve("CHOLERA").await.unwrap();
        normalizer.resolve("  cholera  ").await.unwrap();
        normalizer.resolve("Cholera").await.unwrap();

        assert_eq!(resolver.calls(), 1);
        assert_eq!(normalizer.cached_terms().await, 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_collapse_into_one_resolver_call() {
        let resolver = Arc::new(FakeResolver::new().with_entry("cholera", "1A00", "Cholera"));
        let normalizer = Arc::new(DiagnosisNormalizer::new(resolver.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let normalizer = normalizer.clone();
            handles.push(tokio::spawn(async move {
                normalizer.resolve("Cholera").await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().code, "1A00");
        }
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn resolver_errors_are_not_cached() {
        let resolver = Arc::new(
            FakeResolver::new()
                .with_entry("cholera", "1A00", "Cholera")
                .fail_first(1),
        );
        let normalizer = DiagnosisNormalizer::new(resolver.clone());

        assert!(normalizer.resolve("Cholera").await.is_err());
        let retried = normalizer.resolve("Cholera").await.unwrap();
        assert_eq!(retried.unwrap().code, "1A00");
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn no_match_is_cached_as_a_definitive_outcome() {
        let resolver = Arc::new(FakeResolver::new());
        let normalizer = DiagnosisNormalizer::new(resolver.clone());

        assert!(normalizer.resolve("spontaneous human combustion").await.unwrap().is_none());
        assert!(normalizer.resolve("spontaneous human combustion").await.unwrap().is_none());
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn blank_terms_short_circuit_without_a_lookup() {
        let resolver = Arc::new(FakeResolver::new());
        let normalizer = DiagnosisNormalizer::new(resolver.clone());

        assert!(normalizer.resolve("   ").await.unwrap().is_none());
        assert_eq!(resolver.calls(), 0);
        assert_eq!(normalizer.cached_terms().await, 0);
    }
}
