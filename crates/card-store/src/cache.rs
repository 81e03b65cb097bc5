//! Validation result cache
//!
//! Rapid re-validation of the same configuration (typing in a panel) would
//! otherwise recompute every rule per keystroke. Results are cached by
//! `(content hash, context hash)` with a short TTL so stale rule sets age
//! out quickly.

use crate::validation::{ValidationContext, ValidationReport};
use card_config::ConfigHash;
use moka::sync::Cache;
use std::time::Duration;

/// Default time-to-live for cached reports
pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(3);

/// TTL cache of validation reports
#[derive(Debug, Clone)]
pub struct ValidationCache {
    inner: Cache<(ConfigHash, ConfigHash), ValidationReport>,
}

impl ValidationCache {
    /// Create cache with the given capacity and TTL
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Hash a validation context for use as a cache key component
    #[must_use]
    pub fn context_hash(context: &ValidationContext) -> ConfigHash {
        ConfigHash::of_serializable(context).unwrap_or_default()
    }

    /// Look up a cached report
    #[must_use]
    pub fn get(&self, config: ConfigHash, context: ConfigHash) -> Option<ValidationReport> {
        self.inner.get(&(config, context))
    }

    /// Store a report
    pub fn insert(&self, config: ConfigHash, context: ConfigHash, report: ValidationReport) {
        self.inner.insert((config, context), report);
    }

    /// Drop every cached report (e.g. after the rule set changed)
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of cached reports
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(1_000, DEFAULT_VALIDATION_TTL)
    }
}
