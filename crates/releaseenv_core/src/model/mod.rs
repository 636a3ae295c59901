//! Domain model for release/environment associations.
//!
//! # Responsibility
//! - Define the persisted association record and its natural key.
//! - Derive cache and lock keys deterministically from identifiers.
//!
//! # Invariants
//! - At most one record exists per `(project_id, release_id, environment_id)`.
//! - `first_seen` is written once; only `last_seen` moves afterwards.

pub mod release_environment;
