//! In-memory `CacheStore` with clock-driven expiry.

use super::{CacheError, CacheResult, CacheStore};
use crate::clock::{duration_to_ms, Clock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct CacheEntry {
    value: String,
    expires_at_ms: i64,
}

/// Process-local cache.
///
/// Expired entries are dropped when their key is read and swept on every write.
pub struct InMemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for InMemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now_epoch_ms();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))?;

        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at_ms > now {
            return Ok(Some(entry.value.clone()));
        }

        entries.remove(key);
        Ok(None)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let now = self.clock.now_epoch_ms();
        let expires_at_ms = now.saturating_add(duration_to_ms(ttl));
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))?;
        entries.retain(|_, entry| entry.expires_at_ms > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCache;
    use crate::cache::CacheStore;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryCache::new(clock.clone());

        cache
            .set("k", "v".to_string(), Duration::from_secs(10))
            .expect("set should succeed");
        clock.advance(Duration::from_millis(9_999));
        assert_eq!(cache.get("k").expect("get should succeed").as_deref(), Some("v"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k").expect("get should succeed"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_replaces_value_and_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryCache::new(clock.clone());

        cache
            .set("k", "old".to_string(), Duration::from_secs(1))
            .expect("set should succeed");
        cache
            .set("k", "new".to_string(), Duration::from_secs(60))
            .expect("set should succeed");
        clock.advance(Duration::from_secs(30));

        assert_eq!(cache.get("k").expect("get should succeed").as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn write_sweeps_expired_entries_of_other_keys() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryCache::new(clock.clone());
        cache
            .set("old-a", "v".to_string(), Duration::from_secs(1))
            .expect("set should succeed");
        cache
            .set("old-b", "v".to_string(), Duration::from_secs(1))
            .expect("set should succeed");
        cache
            .set("long", "v".to_string(), Duration::from_secs(3600))
            .expect("set should succeed");
        assert_eq!(cache.len(), 3);

        clock.advance(Duration::from_secs(2));
        cache
            .set("new", "v".to_string(), Duration::from_secs(1))
            .expect("set should succeed");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("long").expect("get should succeed").as_deref(), Some("v"));
    }
}
