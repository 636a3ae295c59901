//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract the resolver relies on.
//! - Isolate SQLite query details from resolver orchestration.
//!
//! # Invariants
//! - The store's uniqueness constraint is the final authority on existence.
//! - Constraint conflicts surface as `RepoError::UniqueViolation`, not as
//!   opaque transport errors.

pub mod release_environment_repo;
