//! Widget-side consumers of the meal store.
//!
//! # Responsibility
//! - Build render-ahead timelines from point-in-time store reads.
//! - Route widget and host actions to the store plus a reload signal.
//!
//! # Invariants
//! - The store knows nothing about scheduling; only this module does.

pub mod intents;
pub mod timeline;
