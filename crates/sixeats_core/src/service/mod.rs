//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate shared-defaults access into meal-tracking use cases.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod meal_store;
