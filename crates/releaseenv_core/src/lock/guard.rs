use super::{Lease, LockService};
use log::warn;

/// Scoped lease that is released when dropped.
pub struct LockGuard<'a> {
    locks: &'a dyn LockService,
    lease: Lease,
}

impl<'a> LockGuard<'a> {
    pub(crate) fn new(locks: &'a dyn LockService, lease: Lease) -> Self {
        Self { locks, lease }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.locks.release(&self.lease) {
            warn!(
                "event=release_env_lock module=lock status=error action=release key={} error={err}",
                self.lease.key
            );
        }
    }
}
