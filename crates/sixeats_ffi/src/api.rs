//! FFI use-case API for host app and widget calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level meal functions to the host via FRB.
//! - Open the shared namespace lazily per call; degrade when unavailable.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Timestamps cross the boundary as epoch milliseconds.
//! - Widget reloads are requested by returning `reload_kind`; the host
//!   platform performs the actual reload.

use log::warn;
use sixeats_core::db::open_namespace;
use sixeats_core::{
    app_became_active as app_became_active_inner, build_timeline,
    core_version as core_version_inner, default_log_level, init_logging as init_logging_inner,
    ping as ping_inner,
    refresh_intent, toggle_meal_intent, Meal, MealStateStore, SqliteSharedDefaults, SystemClock,
    TimelineEntry, TimelinePolicy, TimelineReloader, DEFAULT_NAMESPACE_ID,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::OnceLock;

const SHARED_DIR_ENV: &str = "SIXEATS_SHARED_DIR";
const SHARED_DIR_FALLBACK: &str = "sixeats-shared";
static SHARED_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Blank `level` falls back to the build's default level.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let level = match level.trim() {
        "" => default_log_level(),
        explicit => explicit,
    };
    match init_logging_inner(level, log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Meal labels in display order.
#[flutter_rust_bridge::frb(sync)]
pub fn meal_labels() -> Vec<String> {
    Meal::ALL
        .into_iter()
        .map(|meal| meal.label().to_string())
        .collect()
}

/// Response envelope for toggle actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealActionResponse {
    /// Whether the label was accepted.
    pub ok: bool,
    /// Membership after the toggle.
    pub checked: bool,
    /// Whether the change reached shared storage.
    pub persisted: bool,
    /// Widget kind the host should reload, if any.
    pub reload_kind: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

/// One render-ahead widget entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetEntryItem {
    pub date_epoch_ms: i64,
    pub last_eat_epoch_ms: i64,
    pub checked_items: Vec<String>,
    /// Preformatted `"{h}h {m}m"` since the last meal.
    pub elapsed_label: String,
}

/// Widget timeline envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetTimelineResponse {
    pub entries: Vec<WidgetEntryItem>,
    pub reload_after_epoch_ms: i64,
}

/// Toggles one meal for today and asks the host to reload the widget.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; rejected labels return `ok = false` and no reload.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_meal(label: String) -> MealActionResponse {
    let reloader = PendingReload::default();
    let result = with_store(|store| toggle_meal_intent(store, &reloader, label.as_str()));

    match result {
        Ok(outcome) => {
            let message = match (outcome.persisted, outcome.checked) {
                (false, _) => "Shared storage unavailable; nothing saved.".to_string(),
                (true, true) => format!("{} checked.", outcome.label),
                (true, false) => format!("{} unchecked.", outcome.label),
            };
            MealActionResponse {
                ok: true,
                checked: outcome.checked,
                persisted: outcome.persisted,
                reload_kind: reloader.take(),
                message,
            }
        }
        Err(err) => MealActionResponse {
            ok: false,
            checked: false,
            persisted: false,
            reload_kind: None,
            message: format!("toggle_meal failed: {err}"),
        },
    }
}

/// Labels checked today, sorted.
#[flutter_rust_bridge::frb(sync)]
pub fn checked_meals() -> Vec<String> {
    with_store(|store| store.load_checked_items().into_iter().collect())
}

/// Epoch milliseconds of the last meal, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn last_eat_epoch_ms() -> Option<i64> {
    with_store(|store| {
        store
            .load_last_eat_timestamp()
            .map(|instant| instant.timestamp_millis())
    })
}

/// Builds the default widget timeline from one store read.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_timeline() -> WidgetTimelineResponse {
    let timeline = with_store(|store| build_timeline(store, &TimelinePolicy::default()));
    WidgetTimelineResponse {
        entries: timeline.entries.iter().map(to_widget_entry_item).collect(),
        reload_after_epoch_ms: timeline.reload_after.timestamp_millis(),
    }
}

/// Host app became active; returns the widget kind to reload.
#[flutter_rust_bridge::frb(sync)]
pub fn app_became_active() -> Option<String> {
    let reloader = PendingReload::default();
    app_became_active_inner(&reloader);
    reloader.take()
}

/// Widget refresh button; returns the widget kind to reload.
#[flutter_rust_bridge::frb(sync)]
pub fn refresh_widget() -> Option<String> {
    let reloader = PendingReload::default();
    refresh_intent(&reloader);
    reloader.take()
}

/// Captures the reload request so it can be handed back to the host.
#[derive(Default)]
struct PendingReload {
    kind: RefCell<Option<String>>,
}

impl PendingReload {
    fn take(&self) -> Option<String> {
        self.kind.borrow_mut().take()
    }
}

impl TimelineReloader for PendingReload {
    fn reload_timelines(&self, kind: &str) {
        *self.kind.borrow_mut() = Some(kind.to_string());
    }
}

fn resolve_shared_dir() -> PathBuf {
    SHARED_DIR
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(SHARED_DIR_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(SHARED_DIR_FALLBACK)
        })
        .clone()
}

fn with_store<T>(
    f: impl FnOnce(&MealStateStore<SqliteSharedDefaults<'_>, SystemClock>) -> T,
) -> T {
    let conn = match open_namespace(resolve_shared_dir(), DEFAULT_NAMESPACE_ID) {
        Ok(conn) => Some(conn),
        Err(err) => {
            warn!(
                "event=ffi_store_open module=ffi status=degraded error={}",
                err
            );
            None
        }
    };
    let defaults = conn.as_ref().map(SqliteSharedDefaults::new);
    let store = MealStateStore::from_parts(defaults, SystemClock, Default::default());
    f(&store)
}

fn to_widget_entry_item(entry: &TimelineEntry) -> WidgetEntryItem {
    WidgetEntryItem {
        date_epoch_ms: entry.date.timestamp_millis(),
        last_eat_epoch_ms: entry.last_eat_at.timestamp_millis(),
        checked_items: entry.checked_items.iter().cloned().collect(),
        elapsed_label: entry.elapsed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        app_became_active, checked_meals, core_version, init_logging, last_eat_epoch_ms,
        meal_labels, ping, refresh_widget, resolve_shared_dir, toggle_meal, widget_timeline,
        SHARED_DIR_ENV,
    };
    use sixeats_core::{DEFAULT_NAMESPACE_ID, WIDGET_KIND};
    use std::path::Path;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    /// Points the shared namespace at a per-run directory before first use.
    fn isolated_shared_dir() -> &'static Path {
        static DIR: OnceLock<TempDir> = OnceLock::new();
        DIR.get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            std::env::set_var(SHARED_DIR_ENV, dir.path());
            dir
        })
        .path()
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn blank_level_falls_back_to_default() {
        let err = init_logging("  ".to_string(), "tmp/logs".to_string());
        assert!(err.contains("absolute"), "{err}");
        assert!(!err.contains("log level"), "{err}");
    }

    #[test]
    fn meal_labels_are_in_display_order() {
        assert_eq!(
            meal_labels(),
            vec!["Breakfast", "Lunch", "Dinner", "Snack 1", "Snack 2", "Snack 3"]
        );
    }

    // Single test for all shared-state calls: they share one namespace file.
    #[test]
    fn toggle_round_trip_through_shared_namespace() {
        let dir = isolated_shared_dir();
        assert_eq!(resolve_shared_dir(), dir);
        assert!(checked_meals().is_empty());
        assert_eq!(last_eat_epoch_ms(), None);

        let first = toggle_meal("Snack 3".to_string());
        assert!(first.ok, "{}", first.message);
        assert!(first.persisted);
        assert!(first.checked);
        assert_eq!(first.reload_kind.as_deref(), Some(WIDGET_KIND));
        assert_eq!(checked_meals(), vec!["Snack 3".to_string()]);
        assert!(dir.join(format!("{DEFAULT_NAMESPACE_ID}.sqlite3")).exists());

        let second = toggle_meal("Snack 3".to_string());
        assert!(!second.checked);
        assert!(checked_meals().is_empty());

        let rejected = toggle_meal("Elevenses".to_string());
        assert!(!rejected.ok);
        assert!(rejected.reload_kind.is_none());
        assert!(rejected.message.contains("Elevenses"));

        assert!(last_eat_epoch_ms().is_some());
        let timeline = widget_timeline();
        assert_eq!(timeline.entries.len(), 8);
        assert!(timeline.reload_after_epoch_ms > timeline.entries[0].date_epoch_ms);
    }

    #[test]
    fn reload_actions_return_widget_kind() {
        assert_eq!(app_became_active().as_deref(), Some(WIDGET_KIND));
        assert_eq!(refresh_widget().as_deref(), Some(WIDGET_KIND));
    }
}
