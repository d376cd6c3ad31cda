//! Domain model for daily meal tracking.
//!
//! # Responsibility
//! - Define the meal vocabulary shared by app and widget.
//! - Define the read snapshot of the shared daily record.

pub mod meal;
