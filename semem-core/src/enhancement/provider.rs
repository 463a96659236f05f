//! Enhancement provider trait

use crate::types::EnhancementProviderKind;
use anyhow::Result;
use async_trait::async_trait;

/// External-knowledge lookup provider.
///
/// Implementations return a text snippet answering (or expanding) the
/// question; the coordinator owns caching, retries, and persistence.
#[async_trait]
pub trait EnhancementProvider: Send + Sync {
    /// Which provider family this is
    fn kind(&self) -> EnhancementProviderKind;

    /// Provider name for diagnostics
    fn name(&self) -> &str;

    /// Look up external content for `question`
    async fn lookup(&self, question: &str) -> Result<String>;
}
