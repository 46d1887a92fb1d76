use super::CodeResolver;
use crate::model::IcdMatch;
use crate::normalize::normalize_term;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Table-backed resolver for tests. Lookups are keyed on normalized terms;
/// `fail_first(n)` makes the first `n` calls error to exercise retry and
/// cache paths.
#[derive(Clone, Default)]
pub struct FakeResolver {
    table: HashMap<String, IcdMatch>,
    calls: Arc<AtomicUsize>,
    fail_first: Arc<AtomicUsize>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(mut self, term: &str, code: &str, title: &str) -> Self {
        self.table.insert(
            normalize_term(term),
            IcdMatch {
                code: code.to_string(),
                title: title.to_string(),
            },
        );
        self
    }

    #[must_use]
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeResolver for FakeResolver {
    async fn resolve(&self, term: &str) -> anyhow::Result<Option<IcdMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("scripted resolver failure");
        }
        Ok(self.table.get(&normalize_term(term)).cloned())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn table_lookups_normalize_the_term() {
        let resolver = FakeResolver::new().with_entry("Cholera", "1A00", "Cholera");
        let m = resolver.resolve("  CHOLERA ").await.unwrap().unwrap();
        assert_eq!(m.code, "1A00");
        assert!(resolver.resolve("giardiasis").await.unwrap().is_none());
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let resolver = FakeResolver::new()
            .with_entry("cholera", "1A00", "Cholera")
            .fail_first(2);
        assert!(resolver.resolve("cholera").await.is_err());
        assert!(resolver.resolve("cholera").await.is_err());
        assert!(resolver.resolve("cholera").await.unwrap().is_some());
    }
}
