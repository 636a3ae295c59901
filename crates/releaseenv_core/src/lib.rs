//! Resolve-or-create coordination for release environment associations.
//!
//! Guarantees one persisted association per `(project, release, environment)`
//! under concurrent callers, using a store with a uniqueness constraint, an
//! advisory cache, and a lease-based lock to serialize creation.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod lock;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::{CacheError, CacheResult, CacheStore, InMemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ResolverConfig;
pub use lock::{
    Backoff, ExponentialBackoff, FixedBackoff, InMemoryLockService, Lease, LockError, LockResult,
    LockService, NoBackoff, RetryPolicy,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::release_environment::{
    NewReleaseEnvironment, ReleaseEnvironment, ReleaseEnvironmentId, ReleaseEnvironmentKey,
};
pub use repo::release_environment_repo::{
    ReleaseEnvironmentRepository, RepoError, RepoResult, SqliteReleaseEnvironmentRepository,
};
pub use service::release_environment_service::{
    select_preferred, ReleaseEnvironmentService, ResolveOutcome, ServiceError, ServiceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
