//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, cache and lock ports into the resolve use case.
//! - Keep callers decoupled from storage and coordination details.

pub mod release_environment_service;
