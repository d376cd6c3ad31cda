//! Repository layer over the shared key-value namespace.
//!
//! # Responsibility
//! - Define the `SharedDefaults` contract used by the meal store.
//! - Isolate SQLite query details from store logic.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`StorageUnavailable`,
//!   `InvalidData`) in addition to DB transport errors.

pub mod defaults_repo;
