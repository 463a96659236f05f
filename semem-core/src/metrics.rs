//! Cache counters surfaced through `inspect`

use serde::{Deserialize, Serialize};

/// Hit/miss/eviction counters for one cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total evictions (capacity or TTL)
    pub evictions: u64,
    /// Total explicit invalidations
    pub invalidations: u64,
    /// Current entry count
    pub size: usize,
    /// Maximum capacity
    pub capacity: usize,
}

impl CacheMetrics {
    /// Hit rate in `[0.0, 1.0]`
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Whether the cache is earning its keep (hit rate ≥ 40%)
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.hit_rate() >= 0.4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics {
            hits: 3,
            misses: 1,
            ..CacheMetrics::default()
        };
        assert!((metrics.hit_rate() - 0.75).abs() < 1e-9);
        assert!(metrics.is_effective());
    }

    #[test]
    fn test_empty_cache_rate_is_zero() {
        assert!(CacheMetrics::default().hit_rate().abs() < f64::EPSILON);
    }
}
