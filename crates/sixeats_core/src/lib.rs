//! Core domain logic for SixEats.
//! This crate is the single source of truth for the daily meal record
//! shared by the host app and the home-screen widget.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod widget;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::meal::{Meal, MealDay, MealValidationError};
pub use repo::defaults_repo::{
    MemorySharedDefaults, RepoError, RepoResult, SharedDefaults, SharedValue,
    SqliteSharedDefaults,
};
pub use service::meal_store::{
    LabelPolicy, MealStateStore, StoreConfig, TimestampPolicy, ToggleOutcome,
};
pub use widget::intents::{
    app_became_active, refresh_intent, toggle_meal_intent, TimelineReloader, WIDGET_KIND,
};
pub use widget::timeline::{
    build_timeline, placeholder_entry, snapshot_entry, ElapsedSinceMeal, Timeline, TimelineEntry,
    TimelinePolicy, MAX_TIMELINE_ENTRIES,
};

/// Default shared namespace identifier used by host app and widget.
pub const DEFAULT_NAMESPACE_ID: &str = "group.com.example.SixEats";

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
