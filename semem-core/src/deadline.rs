//! Verb deadlines
//!
//! Every suspension point in the engine (provider calls, store queries,
//! flush drains) takes a [`Deadline`] so cancellation and timeout budgets
//! propagate through the call chain instead of living in ad-hoc sleeps.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// An absolute point in time a verb must finish by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Time left before expiry (zero once passed)
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A deadline at the midpoint between now and expiry.
    ///
    /// Used for the local-branch soft timeout (`T_total / 2`).
    #[must_use]
    pub fn halfway(&self) -> Self {
        Self {
            at: Instant::now() + self.remaining() / 2,
        }
    }

    /// The earlier of this deadline and `budget` from now
    #[must_use]
    pub fn capped(&self, budget: Duration) -> Self {
        let candidate = Instant::now() + budget;
        Self {
            at: self.at.min(candidate),
        }
    }

    /// Run `fut` under this deadline, mapping expiry to
    /// [`Error::DeadlineExceeded`].
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(Error::DeadlineExceeded);
        }
        tokio::time::timeout(remaining, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded)
    }

    /// Run a provider call under this deadline, mapping expiry to
    /// [`Error::ProviderTimeout`] tagged with the provider name.
    pub async fn run_provider<T, F>(&self, provider: &str, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(Error::ProviderTimeout(provider.to_string()));
        }
        tokio::time::timeout(remaining, fut)
            .await
            .map_err(|_| Error::ProviderTimeout(provider.to_string()))
    }
}
