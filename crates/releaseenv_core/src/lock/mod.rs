//! Distributed lock port, in-process adapter and bounded retry.
//!
//! # Responsibility
//! - Define single-attempt acquire/release with a lease against a mutex service.
//! - Retry acquisition under a bounded `RetryPolicy` with pluggable backoff.
//! - Release held leases on every exit path through `LockGuard`.
//!
//! # Invariants
//! - A lease auto-expires after its duration; a crashed holder never
//!   blocks a key forever.
//! - Release only succeeds for the token that acquired the lease.

mod guard;
mod memory;
mod retry;

pub use guard::LockGuard;
pub use memory::InMemoryLockService;
pub use retry::{
    acquire_with_retry, Backoff, ExponentialBackoff, FixedBackoff, NoBackoff, RetryPolicy,
};

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

pub type LockResult<T> = Result<T, LockError>;

#[derive(Debug)]
pub enum LockError {
    /// Another holder owns an unexpired lease on the key.
    Held(String),
    /// The lease expired and the key was taken over before release.
    LeaseLost(String),
    /// The lock service could not serve the request.
    Backend(String),
    /// Every attempt allowed by the retry policy failed.
    Exhausted {
        key: String,
        attempts: u32,
        last_error: Box<LockError>,
    },
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Held(key) => write!(f, "lock `{key}` is held by another owner"),
            Self::LeaseLost(key) => write!(f, "lease on lock `{key}` was lost before release"),
            Self::Backend(message) => write!(f, "lock backend error: {message}"),
            Self::Exhausted {
                key,
                attempts,
                last_error,
            } => write!(
                f,
                "unable to acquire lock `{key}` after {attempts} attempts: {last_error}"
            ),
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error.as_ref()),
            Self::Held(_) | Self::LeaseLost(_) | Self::Backend(_) => None,
        }
    }
}

/// Proof of a granted lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: String,
    pub token: Uuid,
    pub duration: Duration,
}

/// Mutex service with lease expiry.
///
/// `acquire` makes exactly one attempt; retrying is the caller's concern.
pub trait LockService: Send + Sync {
    fn acquire(&self, key: &str, lease: Duration) -> LockResult<Lease>;
    fn release(&self, lease: &Lease) -> LockResult<()>;
}
