//! Bounded retry around single-attempt lock acquisition.

use super::{LockError, LockGuard, LockResult, LockService};
use log::{debug, warn};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Spacing between failed acquisition attempts.
pub trait Backoff: Send + Sync + Debug {
    /// Delay after the `attempt`-th failure (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Retries immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Constant delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling delay starting at `base`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Attempt budget plus spacing strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Acquires `key`, retrying per `policy`.
///
/// # Errors
/// - `LockError::Exhausted` once `policy.max_attempts` attempts failed. The
///   last attempt's error is attached.
pub fn acquire_with_retry<'a>(
    locks: &'a dyn LockService,
    key: &str,
    lease: Duration,
    policy: &RetryPolicy,
) -> LockResult<LockGuard<'a>> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match locks.acquire(key, lease) {
            Ok(granted) => {
                debug!(
                    "event=release_env_lock module=lock status=ok action=acquire key={key} attempt={attempt}"
                );
                return Ok(LockGuard::new(locks, granted));
            }
            Err(err) => err,
        };

        if attempt >= max_attempts {
            warn!(
                "event=release_env_lock module=lock status=error action=acquire key={key} attempts={attempt} error_code=lock_exhausted error={err}"
            );
            return Err(LockError::Exhausted {
                key: key.to_string(),
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        let delay = policy.backoff.delay(attempt);
        debug!(
            "event=release_env_lock module=lock status=retry action=acquire key={key} attempt={attempt} delay_ms={} error={err}",
            delay.as_millis()
        );
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}
