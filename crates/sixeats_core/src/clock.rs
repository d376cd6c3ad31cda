//! Time source used for timestamps and calendar-day rollover.
//!
//! # Invariants
//! - Instants are always UTC; calendar dates are derived in the clock's zone.
//! - "Same day" means same local calendar date, never a 24-hour interval.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use std::sync::Mutex;

pub trait Clock {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock calendar date of `instant` in this clock's zone.
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        (**self).local_date(instant)
    }
}

/// Operating system clock in the process-local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }
}

/// Settable clock with a fixed UTC offset.
#[derive(Debug)]
pub struct ManualClock {
    offset: FixedOffset,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            offset,
            now: Mutex::new(now),
        }
    }

    /// Clock in UTC starting at `now`.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    /// Clock starting at local wall-clock time `y-m-d h:mi` in `offset`.
    ///
    /// Returns `None` for an invalid date or time.
    pub fn at_local(
        offset: FixedOffset,
        (year, month, day): (i32, u32, u32),
        (hour, minute): (u32, u32),
    ) -> Option<Self> {
        let local = offset
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()?;
        Some(Self::new(local.with_timezone(&Utc), offset))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // Poisoning only happens if a test panicked mid-update; the value is still valid.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}
