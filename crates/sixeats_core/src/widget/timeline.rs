//! Render-ahead timeline for the home-screen widget.
//!
//! # Responsibility
//! - Turn one store read into a short series of future-dated entries.
//! - Provide storage-free placeholder and snapshot entries.
//!
//! # Invariants
//! - All entries of a timeline share one store read.
//! - Entry dates are strictly increasing from `now`.
//! - Placeholder/snapshot builders never touch storage.

use crate::clock::Clock;
use crate::model::meal::Meal;
use crate::repo::defaults_repo::SharedDefaults;
use crate::service::meal_store::MealStateStore;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Upper bound on entries per timeline, whatever the policy asks for.
pub const MAX_TIMELINE_ENTRIES: usize = 96;

/// Scheduling knobs for widget timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinePolicy {
    /// Gap between consecutive entries.
    pub entry_interval: Duration,
    /// Span covered by entries, starting at `now` (exclusive end).
    pub window: Duration,
    /// Delay after which the platform should rebuild the timeline.
    pub reload_after: Duration,
    /// Offset before `now` used when no meal was ever recorded.
    pub fallback_last_eat: Duration,
}

impl Default for TimelinePolicy {
    fn default() -> Self {
        Self {
            entry_interval: Duration::minutes(15),
            window: Duration::minutes(120),
            reload_after: Duration::hours(2),
            fallback_last_eat: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Instant at which the platform displays this entry.
    pub date: DateTime<Utc>,
    pub last_eat_at: DateTime<Utc>,
    pub checked_items: BTreeSet<String>,
}

impl TimelineEntry {
    pub fn is_checked(&self, meal: Meal) -> bool {
        self.checked_items.contains(meal.label())
    }

    /// Time between the last meal and this entry's display date.
    pub fn elapsed(&self) -> ElapsedSinceMeal {
        ElapsedSinceMeal::between(self.last_eat_at, self.date)
    }
}

/// Whole hours and remaining minutes since the last meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedSinceMeal {
    pub hours: i64,
    pub minutes: i64,
}

impl ElapsedSinceMeal {
    /// Clamps to zero when `last_eat_at` is after `at`.
    pub fn between(last_eat_at: DateTime<Utc>, at: DateTime<Utc>) -> Self {
        let total_minutes = (at - last_eat_at).num_minutes().max(0);
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        }
    }
}

impl Display for ElapsedSinceMeal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    /// Instant after which the platform should request a new timeline.
    pub reload_after: DateTime<Utc>,
}

/// Builds the widget timeline from a single store snapshot.
///
/// A non-positive `entry_interval` yields a single entry at `now`. At most
/// [`MAX_TIMELINE_ENTRIES`] entries are built; instants that would leave
/// chrono's range are clamped or end the series.
pub fn build_timeline<D, C>(store: &MealStateStore<D, C>, policy: &TimelinePolicy) -> Timeline
where
    D: SharedDefaults,
    C: Clock,
{
    let now = store.clock().now();
    let day = store.snapshot();
    let checked_items = day.checked_items;
    let last_eat_at = day.last_eat_at.unwrap_or_else(|| {
        now.checked_sub_signed(policy.fallback_last_eat)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    });

    let mut entries = Vec::new();
    let mut offset = Duration::zero();
    while entries.len() < MAX_TIMELINE_ENTRIES {
        let Some(date) = now.checked_add_signed(offset) else {
            break;
        };
        entries.push(TimelineEntry {
            date,
            last_eat_at,
            checked_items: checked_items.clone(),
        });
        if policy.entry_interval <= Duration::zero() {
            break;
        }
        match offset.checked_add(&policy.entry_interval) {
            Some(next) if next < policy.window => offset = next,
            _ => break,
        }
    }

    debug!(
        "event=timeline_build module=widget status=ok entries={} checked={}",
        entries.len(),
        checked_items.len()
    );

    Timeline {
        entries,
        reload_after: now
            .checked_add_signed(policy.reload_after)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Static entry shown while the widget gallery renders.
pub fn placeholder_entry(now: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry {
        date: now,
        last_eat_at: now,
        checked_items: [Meal::Breakfast, Meal::Snack1]
            .into_iter()
            .map(|meal| meal.label().to_string())
            .collect(),
    }
}

/// Quick preview entry; never reads shared storage.
pub fn snapshot_entry(now: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry {
        date: now,
        last_eat_at: now - Duration::hours(1),
        checked_items: BTreeSet::from([Meal::Breakfast.label().to_string()]),
    }
}
