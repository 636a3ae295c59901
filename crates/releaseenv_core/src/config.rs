//! Resolver tuning knobs.

use crate::lock::{Backoff, ExponentialBackoff, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

/// TTL applied to every cache write, refreshes included.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);
/// Lease on the creation lock.
pub const LOCK_LEASE: Duration = Duration::from_secs(5);
/// Attempts allowed for acquiring the creation lock.
pub const LOCK_ATTEMPTS: u32 = 10;
/// Minimum age of `last_seen` before it is persisted again.
pub const LAST_SEEN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

const LOCK_BACKOFF_BASE: Duration = Duration::from_millis(25);
const LOCK_BACKOFF_MAX: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub cache_ttl: Duration,
    pub lock_lease: Duration,
    pub lock_retry: RetryPolicy,
    pub refresh_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: CACHE_TTL,
            lock_lease: LOCK_LEASE,
            lock_retry: RetryPolicy::new(
                LOCK_ATTEMPTS,
                Arc::new(ExponentialBackoff {
                    base: LOCK_BACKOFF_BASE,
                    max: LOCK_BACKOFF_MAX,
                }),
            ),
            refresh_interval: LAST_SEEN_REFRESH_INTERVAL,
        }
    }
}

impl ResolverConfig {
    /// Replaces the spacing between lock attempts, keeping the attempt budget.
    pub fn with_lock_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.lock_retry.backoff = backoff;
        self
    }

    pub fn with_lock_attempts(mut self, max_attempts: u32) -> Self {
        self.lock_retry.max_attempts = max_attempts;
        self
    }

    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = lease;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ResolverConfig, CACHE_TTL, LOCK_ATTEMPTS, LOCK_LEASE};
    use crate::lock::NoBackoff;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn defaults_match_documented_values() {
        let config = ResolverConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.cache_ttl, CACHE_TTL);
        assert_eq!(config.lock_lease, LOCK_LEASE);
        assert_eq!(config.lock_retry.max_attempts, LOCK_ATTEMPTS);
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn backoff_override_keeps_attempt_budget() {
        let config = ResolverConfig::default().with_lock_backoff(Arc::new(NoBackoff));
        assert_eq!(config.lock_retry.max_attempts, 10);
        assert!(config.lock_retry.backoff.delay(3).is_zero());
    }
}
