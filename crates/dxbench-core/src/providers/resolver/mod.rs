//! ICD-11 code resolution: free-text diagnosis term in, coded entity out.

pub mod fake;
pub mod who;

pub use fake::FakeResolver;
pub use who::WhoIcdResolver;

use crate::model::IcdMatch;
use async_trait::async_trait;

/// Resolves one already-normalized diagnosis term to an ICD-11 code.
/// `Ok(None)` means the terminology has no plausible entry; errors are
/// reserved for infrastructure failures (auth, network, malformed replies).
#[async_trait]
pub trait CodeResolver: Send + Sync {
    async fn resolve(&self, term: &str) -> anyhow::Result<Option<IcdMatch>>;

    fn name(&self) -> &'static str;
}
