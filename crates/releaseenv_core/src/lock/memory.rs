//! In-process `LockService` with clock-driven lease expiry.

use super::{Lease, LockError, LockResult, LockService};
use crate::clock::{duration_to_ms, Clock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct Holder {
    token: Uuid,
    expires_at_ms: i64,
}

/// Lock table shared by every resolver in one process.
///
/// Expired leases are swept on every acquire.
pub struct InMemoryLockService {
    clock: Arc<dyn Clock>,
    holders: Mutex<HashMap<String, Holder>>,
}

impl InMemoryLockService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            holders: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `key` currently has an unexpired holder.
    pub fn is_held(&self, key: &str) -> bool {
        let now = self.clock.now_epoch_ms();
        self.holders
            .lock()
            .map(|holders| {
                holders
                    .get(key)
                    .is_some_and(|holder| holder.expires_at_ms > now)
            })
            .unwrap_or(false)
    }
}

impl LockService for InMemoryLockService {
    fn acquire(&self, key: &str, lease: Duration) -> LockResult<Lease> {
        let now = self.clock.now_epoch_ms();
        let mut holders = self
            .holders
            .lock()
            .map_err(|_| LockError::Backend("lock table mutex poisoned".to_string()))?;

        holders.retain(|_, holder| holder.expires_at_ms > now);
        if holders.contains_key(key) {
            return Err(LockError::Held(key.to_string()));
        }

        let token = Uuid::new_v4();
        holders.insert(
            key.to_string(),
            Holder {
                token,
                expires_at_ms: now.saturating_add(duration_to_ms(lease)),
            },
        );

        Ok(Lease {
            key: key.to_string(),
            token,
            duration: lease,
        })
    }

    fn release(&self, lease: &Lease) -> LockResult<()> {
        let mut holders = self
            .holders
            .lock()
            .map_err(|_| LockError::Backend("lock table mutex poisoned".to_string()))?;

        match holders.get(&lease.key) {
            Some(holder) if holder.token == lease.token => {
                holders.remove(&lease.key);
                Ok(())
            }
            _ => Err(LockError::LeaseLost(lease.key.clone())),
        }
    }
}
