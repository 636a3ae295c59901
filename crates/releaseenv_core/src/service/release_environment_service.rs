//! Release environment resolve-or-create service.
//!
//! # Responsibility
//! - Return the single association for a natural key, creating it when absent.
//! - Serialize creation per organization/release/environment through the lock port.
//! - Throttle persisted `last_seen` writes while keeping cached copies current.
//!
//! # Invariants
//! - The store's uniqueness constraint decides existence; lock and cache only
//!   reduce contention and read load.
//! - The creation lock is released on every exit path.
//! - Races and constraint conflicts are absorbed here; only lock exhaustion
//!   and backing-service failures reach the caller.
//! - Cached `last_seen` may run ahead of the stored value by up to the
//!   refresh interval.

use crate::cache::{CacheError, CacheStore};
use crate::clock::{duration_to_ms, Clock};
use crate::config::ResolverConfig;
use crate::lock::{acquire_with_retry, LockError, LockService};
use crate::model::release_environment::{
    NewReleaseEnvironment, ReleaseEnvironment, ReleaseEnvironmentKey,
};
use crate::repo::release_environment_repo::{ReleaseEnvironmentRepository, RepoError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures that cross the resolver boundary.
#[derive(Debug)]
pub enum ServiceError {
    /// The creation lock could not be acquired within the retry budget.
    LockTimeout { lock_key: String, attempts: u32 },
    /// The natural key is already stored under a different organization.
    ForeignOwner { key: ReleaseEnvironmentKey },
    Repo(RepoError),
    Cache(CacheError),
    Lock(LockError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockTimeout { lock_key, attempts } => write!(
                f,
                "timed out acquiring lock `{lock_key}` after {attempts} attempts"
            ),
            Self::ForeignOwner { key } => write!(
                f,
                "project {} already has release {} in environment {} outside organization {}",
                key.project_id, key.release_id, key.environment_id, key.organization_id
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "{err}"),
            Self::Lock(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LockTimeout { .. } | Self::ForeignOwner { .. } => None,
            Self::Repo(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::Lock(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CacheError> for ServiceError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Cache(CacheError::Codec(value))
    }
}

/// Resolved association plus whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub release_environment: ReleaseEnvironment,
    pub created: bool,
}

/// Picks the row owned by `project_id`, else the first row.
///
/// Rows for sibling projects of the same organization, release and
/// environment are interchangeable when no exact match exists.
pub fn select_preferred(
    rows: Vec<ReleaseEnvironment>,
    project_id: u32,
) -> Option<ReleaseEnvironment> {
    let preferred = rows
        .iter()
        .position(|row| row.project_id == project_id)
        .unwrap_or(0);
    rows.into_iter().nth(preferred)
}

/// Resolve-or-create coordinator over store, cache and lock ports.
pub struct ReleaseEnvironmentService<R: ReleaseEnvironmentRepository> {
    repo: R,
    cache: Arc<dyn CacheStore>,
    locks: Arc<dyn LockService>,
    clock: Arc<dyn Clock>,
    config: ResolverConfig,
}

impl<R: ReleaseEnvironmentRepository> ReleaseEnvironmentService<R> {
    /// Creates a service with default tuning.
    pub fn new(
        repo: R,
        cache: Arc<dyn CacheStore>,
        locks: Arc<dyn LockService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            cache,
            locks,
            clock,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the association for `key`, creating it if needed.
    ///
    /// `observed_at` is Unix epoch milliseconds. It seeds `first_seen` and
    /// `last_seen` on creation and drives the throttled refresh otherwise.
    ///
    /// # Errors
    /// - `ServiceError::LockTimeout` when creation contention outlasts the
    ///   retry budget. No row is written in that case.
    /// - `ServiceError::ForeignOwner` when the project already holds this
    ///   release/environment under another organization.
    /// - `Repo`/`Cache`/`Lock` errors when a backing service fails.
    pub fn resolve(
        &self,
        key: &ReleaseEnvironmentKey,
        observed_at: i64,
    ) -> ServiceResult<ReleaseEnvironment> {
        self.resolve_with_outcome(key, observed_at)
            .map(|outcome| outcome.release_environment)
    }

    /// Same as [`Self::resolve`], observed at the injected clock's current time.
    pub fn resolve_now(&self, key: &ReleaseEnvironmentKey) -> ServiceResult<ReleaseEnvironment> {
        self.resolve(key, self.clock.now_epoch_ms())
    }

    /// Same as [`Self::resolve`], also reporting whether this call created the row.
    pub fn resolve_with_outcome(
        &self,
        key: &ReleaseEnvironmentKey,
        observed_at: i64,
    ) -> ServiceResult<ResolveOutcome> {
        let cache_key = key.cache_key();

        let (mut instance, created) = match self.read_cached(&cache_key)? {
            Some(cached) => {
                debug!(
                    "event=release_env_resolve module=service status=ok source=cache cache_key={cache_key} id={}",
                    cached.id
                );
                (cached, false)
            }
            None => {
                let (instance, created) = self.load_or_create(key, observed_at)?;
                self.write_cached(&cache_key, &instance)?;
                (instance, created)
            }
        };

        if !created {
            self.refresh_last_seen(&cache_key, &mut instance, observed_at)?;
        }

        Ok(ResolveOutcome {
            release_environment: instance,
            created,
        })
    }

    fn load_or_create(
        &self,
        key: &ReleaseEnvironmentKey,
        observed_at: i64,
    ) -> ServiceResult<(ReleaseEnvironment, bool)> {
        let rows =
            self.repo
                .find_by_key(key.release_id, key.organization_id, key.environment_id)?;
        let candidates = rows.len();
        if let Some(found) = select_preferred(rows, key.project_id) {
            debug!(
                "event=release_env_resolve module=service status=ok source=store candidates={candidates} id={} exact_project={}",
                found.id,
                found.project_id == key.project_id
            );
            return Ok((found, false));
        }

        let lock_key = key.lock_key();
        let guard = acquire_with_retry(
            self.locks.as_ref(),
            &lock_key,
            self.config.lock_lease,
            &self.config.lock_retry,
        )
        .map_err(|err| match err {
            LockError::Exhausted { attempts, .. } => ServiceError::LockTimeout {
                lock_key: lock_key.clone(),
                attempts,
            },
            other => ServiceError::Lock(other),
        })?;

        let resolved = self.create_locked(key, observed_at);
        drop(guard);
        resolved
    }

    /// Runs with the creation lock held.
    fn create_locked(
        &self,
        key: &ReleaseEnvironmentKey,
        observed_at: i64,
    ) -> ServiceResult<(ReleaseEnvironment, bool)> {
        if let Some(existing) = self.find_exact(key)? {
            debug!(
                "event=release_env_resolve module=service status=ok source=store_locked id={}",
                existing.id
            );
            return Ok((existing, false));
        }

        match self
            .repo
            .insert(&NewReleaseEnvironment::observed(*key, observed_at))
        {
            Ok(created) => {
                info!(
                    "event=release_env_resolve module=service status=ok source=insert id={} lock_key={}",
                    created.id,
                    key.lock_key()
                );
                Ok((created, true))
            }
            Err(RepoError::UniqueViolation(message)) => {
                info!(
                    "event=release_env_resolve module=service status=conflict source=insert lock_key={} error={message}",
                    key.lock_key()
                );
                // The constraint ignores organization; a miss here means the
                // conflicting row belongs to another organization.
                self.find_exact(key)?
                    .map(|existing| (existing, false))
                    .ok_or(ServiceError::ForeignOwner { key: *key })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn find_exact(&self, key: &ReleaseEnvironmentKey) -> ServiceResult<Option<ReleaseEnvironment>> {
        let found =
            self.repo
                .find_exact(key.release_id, key.organization_id, key.environment_id)?;
        Ok(found)
    }

    fn refresh_last_seen(
        &self,
        cache_key: &str,
        instance: &mut ReleaseEnvironment,
        observed_at: i64,
    ) -> ServiceResult<()> {
        let threshold =
            observed_at.saturating_sub(duration_to_ms(self.config.refresh_interval));
        if instance.last_seen >= threshold {
            return Ok(());
        }

        let affected = self
            .repo
            .touch_last_seen(instance.id, threshold, observed_at)?;
        debug!(
            "event=release_env_refresh module=service status=ok id={} affected={affected} previous_last_seen={} last_seen={observed_at}",
            instance.id, instance.last_seen
        );

        instance.last_seen = observed_at;
        self.write_cached(cache_key, instance)
    }

    fn read_cached(&self, cache_key: &str) -> ServiceResult<Option<ReleaseEnvironment>> {
        let Some(payload) = self.cache.get(cache_key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(instance) => Ok(Some(instance)),
            Err(err) => {
                warn!(
                    "event=release_env_resolve module=service status=error source=cache cache_key={cache_key} error_code=cache_decode_failed error={err}"
                );
                Ok(None)
            }
        }
    }

    fn write_cached(&self, cache_key: &str, instance: &ReleaseEnvironment) -> ServiceResult<()> {
        let payload = serde_json::to_string(instance)?;
        self.cache.set(cache_key, payload, self.config.cache_ttl)?;
        Ok(())
    }
}
