//! Release environment association model.
//!
//! # Responsibility
//! - Define the record linking a release, an environment, a project and an
//!   organization.
//! - Provide stable key derivations shared by cache and lock adapters.
//!
//! # Invariants
//! - Cache keys are scoped to the project; lock keys to the organization.
//! - Key formats are part of the external contract and must not drift.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Store-assigned row identifier.
pub type ReleaseEnvironmentId = i64;

/// Version segment embedded in cache keys. Bump to invalidate cached payloads.
pub const CACHE_KEY_VERSION: u32 = 1;

/// Identifiers of one resolve request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseEnvironmentKey {
    pub organization_id: u32,
    pub project_id: u32,
    pub release_id: u32,
    pub environment_id: u32,
}

impl ReleaseEnvironmentKey {
    pub fn new(organization_id: u32, project_id: u32, release_id: u32, environment_id: u32) -> Self {
        Self {
            organization_id,
            project_id,
            release_id,
            environment_id,
        }
    }

    /// Cache key for the project-scoped association.
    ///
    /// Format: `releaseenv:1:{project_id}:{release_id}:{environment_id}`.
    pub fn cache_key(&self) -> String {
        format!(
            "releaseenv:{CACHE_KEY_VERSION}:{}:{}:{}",
            self.project_id, self.release_id, self.environment_id
        )
    }

    /// Lock key serializing creation across sibling projects.
    ///
    /// Format: `releaseenv:{organization_id}:{release_id}:{environment_id}`.
    pub fn lock_key(&self) -> String {
        format!(
            "releaseenv:{}:{}:{}",
            self.organization_id, self.release_id, self.environment_id
        )
    }
}

/// Persisted association record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEnvironment {
    pub id: ReleaseEnvironmentId,
    pub organization_id: u32,
    pub project_id: u32,
    pub release_id: u32,
    pub environment_id: u32,
    /// Unix epoch milliseconds. Set at creation only.
    pub first_seen: i64,
    /// Unix epoch milliseconds. Advanced by throttled refresh.
    pub last_seen: i64,
}

impl ReleaseEnvironment {
    /// Returns the natural key this record was created for.
    pub fn key(&self) -> ReleaseEnvironmentKey {
        ReleaseEnvironmentKey::new(
            self.organization_id,
            self.project_id,
            self.release_id,
            self.environment_id,
        )
    }
}

impl Display for ReleaseEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ReleaseEnvironment(project_id={}, release_id={}, environment_id={})",
            self.project_id, self.release_id, self.environment_id
        )
    }
}

/// Insert payload for a new association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReleaseEnvironment {
    pub key: ReleaseEnvironmentKey,
    pub first_seen: i64,
    pub last_seen: i64,
}

impl NewReleaseEnvironment {
    /// Builds a payload observed for the first time at `observed_at`.
    pub fn observed(key: ReleaseEnvironmentKey, observed_at: i64) -> Self {
        Self {
            key,
            first_seen: observed_at,
            last_seen: observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NewReleaseEnvironment, ReleaseEnvironment, ReleaseEnvironmentKey};

    #[test]
    fn cache_key_is_project_scoped() {
        let key = ReleaseEnvironmentKey::new(7, 11, 13, 17);
        assert_eq!(key.cache_key(), "releaseenv:1:11:13:17");
    }

    #[test]
    fn lock_key_is_organization_scoped() {
        let key = ReleaseEnvironmentKey::new(7, 11, 13, 17);
        assert_eq!(key.lock_key(), "releaseenv:7:13:17");

        let sibling = ReleaseEnvironmentKey::new(7, 12, 13, 17);
        assert_eq!(key.lock_key(), sibling.lock_key());
        assert_ne!(key.cache_key(), sibling.cache_key());
    }

    #[test]
    fn display_names_identifying_fields() {
        let record = ReleaseEnvironment {
            id: 1,
            organization_id: 2,
            project_id: 3,
            release_id: 4,
            environment_id: 5,
            first_seen: 0,
            last_seen: 0,
        };
        assert_eq!(
            record.to_string(),
            "ReleaseEnvironment(project_id=3, release_id=4, environment_id=5)"
        );
        assert_eq!(record.key(), ReleaseEnvironmentKey::new(2, 3, 4, 5));
    }

    #[test]
    fn observed_payload_sets_both_timestamps() {
        let payload = NewReleaseEnvironment::observed(ReleaseEnvironmentKey::new(1, 2, 3, 4), 99);
        assert_eq!(payload.first_seen, 99);
        assert_eq!(payload.last_seen, 99);
    }
}
