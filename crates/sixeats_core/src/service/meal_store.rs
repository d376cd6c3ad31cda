//! Daily meal-state store shared by the host app and the widget.
//!
//! # Responsibility
//! - Answer "which meals were eaten today" and "when did the user last eat".
//! - Clear checked meals exactly once per local calendar day.
//! - Degrade to safe defaults whenever the shared namespace fails.
//!
//! # Invariants
//! - Every read/write of `checkedItems` runs the day-rollover check first.
//! - `load_last_eat_timestamp` never triggers a rollover.
//! - No store operation returns a storage error or panics.
//! - Cross-process read-modify-write is last-writer-wins.

use crate::clock::Clock;
use crate::model::meal::{Meal, MealDay, MealValidationError};
use crate::repo::defaults_repo::{
    RepoError, RepoResult, SharedDefaults, SharedValue, CHECKED_ITEMS_KEY, LAST_EAT_DATE_KEY,
    LAST_RESET_DATE_KEY,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Which labels `toggle_meal` accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Only the six `Meal` labels; anything else is rejected.
    #[default]
    KnownOnly,
    /// Any string is stored as-is.
    AcceptAny,
}

/// When `toggle_meal` refreshes `lastEatDate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// Only when a meal goes from unchecked to checked.
    #[default]
    OnCheck,
    /// On every toggle, including un-checking.
    EveryToggle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub label_policy: LabelPolicy,
    pub timestamp_policy: TimestampPolicy,
}

/// Result of a toggle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub label: String,
    /// Membership after the toggle; `false` when nothing was persisted.
    pub checked: bool,
    /// Whether the new state reached shared storage.
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rollover {
    FirstRun,
    Reset,
    SameDay,
}

/// Store over an injected shared namespace and clock.
///
/// Constructed once per process and handed to callers. A store built with
/// `unavailable` answers every query with empty results.
pub struct MealStateStore<D, C> {
    defaults: Option<D>,
    clock: C,
    config: StoreConfig,
}

impl<D: SharedDefaults, C: Clock> MealStateStore<D, C> {
    pub fn new(defaults: D, clock: C) -> Self {
        Self::from_parts(Some(defaults), clock, StoreConfig::default())
    }

    /// Store for a namespace that could not be opened.
    pub fn unavailable(clock: C) -> Self {
        Self::from_parts(None, clock, StoreConfig::default())
    }

    pub fn from_parts(defaults: Option<D>, clock: C, config: StoreConfig) -> Self {
        Self {
            defaults,
            clock,
            config,
        }
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_available(&self) -> bool {
        self.defaults.is_some()
    }

    /// Returns today's checked labels after the day-rollover check.
    pub fn load_checked_items(&self) -> BTreeSet<String> {
        let Some(defaults) = self.backend("load_checked_items") else {
            return BTreeSet::new();
        };

        let result = self
            .roll_over_if_new_day(defaults)
            .and_then(|_| read_checked_items(defaults));
        match result {
            Ok(items) => items.into_iter().collect(),
            Err(err) => {
                degrade("load_checked_items", &err);
                BTreeSet::new()
            }
        }
    }

    /// Flips `item` in today's checked set.
    ///
    /// # Errors
    /// - Returns `MealValidationError` when `item` is rejected by the label
    ///   policy. Storage failures are never returned; they yield an outcome
    ///   with `persisted = false`.
    pub fn toggle_meal(&self, item: &str) -> Result<ToggleOutcome, MealValidationError> {
        let label = self.accept_label(item)?;

        let Some(defaults) = self.backend("toggle_meal") else {
            return Ok(ToggleOutcome::not_persisted(label));
        };

        match self.apply_toggle(defaults, &label) {
            Ok(checked) => {
                info!(
                    "event=meal_toggle module=store status=ok label={} checked={}",
                    label, checked
                );
                Ok(ToggleOutcome {
                    label,
                    checked,
                    persisted: true,
                })
            }
            Err(err) => {
                degrade("toggle_meal", &err);
                Ok(ToggleOutcome::not_persisted(label))
            }
        }
    }

    /// Typed toggle; known meals always pass label validation.
    pub fn toggle(&self, meal: Meal) -> ToggleOutcome {
        self.toggle_meal(meal.label())
            .unwrap_or_else(|_| ToggleOutcome::not_persisted(meal.label().to_string()))
    }

    /// Returns the last meal instant without any rollover side effect.
    pub fn load_last_eat_timestamp(&self) -> Option<DateTime<Utc>> {
        let defaults = self.backend("load_last_eat_timestamp")?;
        match defaults.timestamp(LAST_EAT_DATE_KEY) {
            Ok(instant) => instant,
            Err(err) => {
                degrade("load_last_eat_timestamp", &err);
                None
            }
        }
    }

    /// Reads the whole record after the day-rollover check.
    pub fn snapshot(&self) -> MealDay {
        let Some(defaults) = self.backend("snapshot") else {
            return MealDay::default();
        };

        let result = self.roll_over_if_new_day(defaults).and_then(|_| {
            Ok(MealDay {
                last_eat_at: defaults.timestamp(LAST_EAT_DATE_KEY).unwrap_or_else(|err| {
                    degrade("snapshot", &err);
                    None
                }),
                checked_items: read_checked_items(defaults)?.into_iter().collect(),
                last_reset_at: defaults.timestamp(LAST_RESET_DATE_KEY)?,
            })
        });
        result.unwrap_or_else(|err| {
            degrade("snapshot", &err);
            MealDay::default()
        })
    }

    pub(crate) fn roll_over_if_new_day<S: SharedDefaults>(&self, defaults: &S) -> RepoResult<Rollover> {
        let now = self.clock.now();
        let today = self.clock.local_date(now);

        // `observed` is what the clear is conditioned on; `None` means the
        // stored value could not be decoded.
        let (observed, stale) = match defaults.get(LAST_RESET_DATE_KEY) {
            Ok(None) => {
                defaults.set(LAST_RESET_DATE_KEY, &SharedValue::Timestamp(now))?;
                debug!(
                    "event=day_rollover module=store status=first_run today={}",
                    today
                );
                return Ok(Rollover::FirstRun);
            }
            Ok(Some(SharedValue::Timestamp(last))) => {
                let stale = self.clock.local_date(last) != today;
                (Some(SharedValue::Timestamp(last)), stale)
            }
            Ok(Some(other)) => {
                warn!(
                    "event=day_rollover module=store status=recovered reason=invalid_reset_date detail=not_a_timestamp"
                );
                (Some(other), true)
            }
            Err(RepoError::InvalidData(message)) => {
                warn!(
                    "event=day_rollover module=store status=recovered reason=invalid_reset_date detail={}",
                    message
                );
                (None, true)
            }
            Err(err) => return Err(err),
        };

        if !stale {
            return Ok(Rollover::SameDay);
        }

        let entries = [
            (CHECKED_ITEMS_KEY, Some(SharedValue::StringList(Vec::new()))),
            (LAST_RESET_DATE_KEY, Some(SharedValue::Timestamp(now))),
        ];
        match observed {
            Some(expected) => {
                if !defaults.compare_and_write(LAST_RESET_DATE_KEY, Some(&expected), &entries)? {
                    debug!(
                        "event=day_rollover module=store status=skipped reason=reset_by_other_writer today={}",
                        today
                    );
                    return Ok(Rollover::SameDay);
                }
            }
            None => defaults.write_batch(&entries)?,
        }
        info!(
            "event=day_rollover module=store status=reset today={}",
            today
        );
        Ok(Rollover::Reset)
    }

    fn apply_toggle(&self, defaults: &D, label: &str) -> RepoResult<bool> {
        self.roll_over_if_new_day(defaults)?;

        let mut items = read_checked_items(defaults)?;
        let checked = if items.iter().any(|item| item == label) {
            items.retain(|item| item != label);
            false
        } else {
            items.push(label.to_string());
            true
        };

        let mut entries = vec![(CHECKED_ITEMS_KEY, Some(SharedValue::StringList(items)))];
        if checked || self.config.timestamp_policy == TimestampPolicy::EveryToggle {
            entries.push((
                LAST_EAT_DATE_KEY,
                Some(SharedValue::Timestamp(self.clock.now())),
            ));
        }
        defaults.write_batch(&entries)?;

        Ok(checked)
    }

    fn accept_label(&self, item: &str) -> Result<String, MealValidationError> {
        match self.config.label_policy {
            LabelPolicy::KnownOnly => item.parse::<Meal>().map(|meal| meal.label().to_string()),
            LabelPolicy::AcceptAny => Ok(item.to_string()),
        }
    }

    fn backend(&self, op: &str) -> Option<&D> {
        if self.defaults.is_none() {
            warn!(
                "event=storage_unavailable module=store op={} status=degraded",
                op
            );
        }
        self.defaults.as_ref()
    }
}

impl ToggleOutcome {
    fn not_persisted(label: String) -> Self {
        Self {
            label,
            checked: false,
            persisted: false,
        }
    }
}

/// Reads `checkedItems`, treating an undecodable value as an empty list.
fn read_checked_items<D: SharedDefaults>(defaults: &D) -> RepoResult<Vec<String>> {
    match defaults.string_list(CHECKED_ITEMS_KEY) {
        Err(RepoError::InvalidData(message)) => {
            warn!(
                "event=checked_items_read module=store status=recovered detail={}",
                message
            );
            Ok(Vec::new())
        }
        other => other,
    }
}

fn degrade(op: &str, err: &RepoError) {
    warn!(
        "event=store_op module=store op={} status=degraded error={}",
        op, err
    );
}
