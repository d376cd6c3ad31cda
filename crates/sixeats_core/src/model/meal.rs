//! Meal vocabulary and the daily meal-state snapshot.
//!
//! # Responsibility
//! - Define the fixed set of trackable meals and their display labels.
//! - Provide the read model returned to host and widget callers.
//!
//! # Invariants
//! - Labels are stable: they are persisted verbatim in `checkedItems`.
//! - `Meal::ALL` lists meals in widget display order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One of the six meals tracked per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    #[serde(rename = "Snack 1")]
    Snack1,
    #[serde(rename = "Snack 2")]
    Snack2,
    #[serde(rename = "Snack 3")]
    Snack3,
}

impl Meal {
    /// All meals in display order: main meals first, then snacks.
    pub const ALL: [Meal; 6] = [
        Meal::Breakfast,
        Meal::Lunch,
        Meal::Dinner,
        Meal::Snack1,
        Meal::Snack2,
        Meal::Snack3,
    ];

    /// Human label, also used as the persisted value.
    pub fn label(self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
            Meal::Snack1 => "Snack 1",
            Meal::Snack2 => "Snack 2",
            Meal::Snack3 => "Snack 3",
        }
    }

    /// Parses an exact label.
    pub fn from_label(label: &str) -> Option<Meal> {
        Meal::ALL.into_iter().find(|meal| meal.label() == label)
    }
}

impl Display for Meal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Meal {
    type Err = MealValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(MealValidationError::EmptyLabel);
        }
        Meal::from_label(value).ok_or_else(|| MealValidationError::UnknownLabel(value.to_string()))
    }
}

/// Label validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MealValidationError {
    EmptyLabel,
    UnknownLabel(String),
}

impl Display for MealValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLabel => write!(f, "meal label cannot be empty"),
            Self::UnknownLabel(label) => write!(
                f,
                "unknown meal label `{label}`; expected one of Breakfast|Lunch|Dinner|Snack 1|Snack 2|Snack 3"
            ),
        }
    }
}

impl Error for MealValidationError {}

/// Point-in-time view of the shared meal record.
///
/// `checked_items` holds raw labels, so records written under a permissive
/// label policy are still readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealDay {
    /// Instant of the most recent meal, if any was ever recorded.
    pub last_eat_at: Option<DateTime<Utc>>,
    /// Labels checked since the last day rollover.
    pub checked_items: BTreeSet<String>,
    /// Instant of the last rollover; only its calendar date is significant.
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl MealDay {
    pub fn is_checked(&self, meal: Meal) -> bool {
        self.checked_items.contains(meal.label())
    }

    /// Number of known meals checked today.
    pub fn checked_count(&self) -> usize {
        Meal::ALL
            .into_iter()
            .filter(|meal| self.is_checked(*meal))
            .count()
    }
}
