//! Mock enhancement provider for tests

use super::provider::EnhancementProvider;
use crate::types::EnhancementProviderKind;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Deterministic mock lookup with call counting and failure injection
pub struct MockEnhancementProvider {
    kind: EnhancementProviderKind,
    name: String,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockEnhancementProvider {
    /// Create a mock provider of the given family
    #[must_use]
    pub fn new(kind: EnhancementProviderKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Force subsequent lookups to fail (or stop failing)
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of outbound lookups served (cache hits bypass this)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnhancementProvider for MockEnhancementProvider {
    fn kind(&self) -> EnhancementProviderKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, question: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mock {} provider forced failure", self.name);
        }
        Ok(format!("{} reference material for: {question}", self.name))
    }
}
