//! Cache port and in-process adapter.
//!
//! # Responsibility
//! - Define the key/value contract with TTL the resolver writes through.
//! - Provide an in-memory adapter for single-process use and tests.
//!
//! # Invariants
//! - The cache is advisory; readers must tolerate stale or missing entries.
//! - Entries are invisible once their TTL has elapsed on the injected clock.

mod memory;

pub use memory::InMemoryCache;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
pub enum CacheError {
    /// The backing store could not serve the request.
    Backend(String),
    /// A value could not be encoded for storage.
    Codec(serde_json::Error),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(message) => write!(f, "cache backend error: {message}"),
            Self::Codec(err) => write!(f, "cache codec error: {err}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(_) => None,
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

/// Key/value store with per-entry expiry.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry and its TTL.
    fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;
}
