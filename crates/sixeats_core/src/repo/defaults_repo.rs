//! Shared key-value defaults and their SQLite / in-memory implementations.
//!
//! # Responsibility
//! - Provide typed get/set/remove over one shared namespace.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Single-key reads and writes are atomic.
//! - `write_batch` applies all entries or none.
//! - Read paths reject undecodable stored values instead of masking them.

use crate::db::DbError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// Key holding the instant of the most recent meal.
pub const LAST_EAT_DATE_KEY: &str = "lastEatDate";
/// Key holding the list of labels checked today.
pub const CHECKED_ITEMS_KEY: &str = "checkedItems";
/// Key holding the instant of the last day rollover.
pub const LAST_RESET_DATE_KEY: &str = "lastResetDate";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for shared defaults access.
#[derive(Debug)]
pub enum RepoError {
    /// The shared namespace cannot be reached at all.
    StorageUnavailable(String),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(reason) => write!(f, "shared storage unavailable: {reason}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted defaults data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::StorageUnavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Typed value stored under a defaults key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SharedValue {
    Timestamp(DateTime<Utc>),
    StringList(Vec<String>),
}

impl SharedValue {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(instant) => Some(*instant),
            Self::StringList(_) => None,
        }
    }
}

/// Key-value namespace shared by cooperating processes.
pub trait SharedDefaults {
    fn get(&self, key: &str) -> RepoResult<Option<SharedValue>>;
    fn set(&self, key: &str, value: &SharedValue) -> RepoResult<()>;
    fn remove(&self, key: &str) -> RepoResult<()>;
    /// Applies every entry atomically; `None` removes the key.
    fn write_batch(&self, entries: &[(&str, Option<SharedValue>)]) -> RepoResult<()>;
    /// Applies `entries` atomically only if `guard_key` still holds
    /// `expected` when the write starts; returns whether it was applied.
    fn compare_and_write(
        &self,
        guard_key: &str,
        expected: Option<&SharedValue>,
        entries: &[(&str, Option<SharedValue>)],
    ) -> RepoResult<bool>;

    fn timestamp(&self, key: &str) -> RepoResult<Option<DateTime<Utc>>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => value.as_timestamp().map(Some).ok_or_else(|| {
                RepoError::InvalidData(format!("key `{key}` does not hold a timestamp"))
            }),
        }
    }

    fn string_list(&self, key: &str) -> RepoResult<Vec<String>> {
        match self.get(key)? {
            None => Ok(Vec::new()),
            Some(SharedValue::StringList(items)) => Ok(items),
            Some(SharedValue::Timestamp(_)) => Err(RepoError::InvalidData(format!(
                "key `{key}` does not hold a string list"
            ))),
        }
    }
}

impl<D: SharedDefaults + ?Sized> SharedDefaults for &D {
    fn get(&self, key: &str) -> RepoResult<Option<SharedValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &SharedValue) -> RepoResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        (**self).remove(key)
    }

    fn write_batch(&self, entries: &[(&str, Option<SharedValue>)]) -> RepoResult<()> {
        (**self).write_batch(entries)
    }

    fn compare_and_write(
        &self,
        guard_key: &str,
        expected: Option<&SharedValue>,
        entries: &[(&str, Option<SharedValue>)],
    ) -> RepoResult<bool> {
        (**self).compare_and_write(guard_key, expected, entries)
    }
}

/// SQLite-backed defaults over a connection from `db::open_namespace`.
pub struct SqliteSharedDefaults<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSharedDefaults<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SharedDefaults for SqliteSharedDefaults<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<SharedValue>> {
        read_raw(self.conn, key)?
            .map(|text| decode_value(key, &text))
            .transpose()
    }

    fn set(&self, key: &str, value: &SharedValue) -> RepoResult<()> {
        upsert(self.conn, key, value)
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM shared_defaults WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn write_batch(&self, entries: &[(&str, Option<SharedValue>)]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        apply_entries(&tx, entries)?;
        tx.commit()?;
        Ok(())
    }

    fn compare_and_write(
        &self,
        guard_key: &str,
        expected: Option<&SharedValue>,
        entries: &[(&str, Option<SharedValue>)],
    ) -> RepoResult<bool> {
        // IMMEDIATE holds the write lock across the guard read and the writes.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = read_raw(&tx, guard_key)?;
        let unchanged = match (current.as_deref(), expected) {
            (None, None) => true,
            (Some(text), Some(expected)) => {
                decode_value(guard_key, text).is_ok_and(|value| &value == expected)
            }
            _ => false,
        };
        if !unchanged {
            return Ok(false);
        }
        apply_entries(&tx, entries)?;
        tx.commit()?;
        Ok(true)
    }
}

fn read_raw(conn: &Connection, key: &str) -> RepoResult<Option<String>> {
    let raw = conn
        .query_row(
            "SELECT value FROM shared_defaults WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw)
}

fn apply_entries(conn: &Connection, entries: &[(&str, Option<SharedValue>)]) -> RepoResult<()> {
    for (key, value) in entries {
        match value {
            Some(value) => upsert(conn, key, value)?,
            None => {
                conn.execute("DELETE FROM shared_defaults WHERE key = ?1;", [key])?;
            }
        }
    }
    Ok(())
}

fn upsert(conn: &Connection, key: &str, value: &SharedValue) -> RepoResult<()> {
    let encoded = serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode key `{key}`: {err}")))?;
    conn.execute(
        "INSERT INTO shared_defaults (key, value)
         VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![key, encoded],
    )?;
    Ok(())
}

fn decode_value(key: &str, text: &str) -> RepoResult<SharedValue> {
    serde_json::from_str(text).map_err(|err| {
        RepoError::InvalidData(format!("undecodable value for key `{key}`: {err}"))
    })
}

/// In-process defaults used as a test fake and for ephemeral stores.
#[derive(Debug, Default)]
pub struct MemorySharedDefaults {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, SharedValue>,
    unavailable: bool,
}

impl MemorySharedDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates sandbox denial: every call fails with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self) -> RepoResult<std::sync::MutexGuard<'_, MemoryState>> {
        let guard = self.lock();
        if guard.unavailable {
            return Err(RepoError::StorageUnavailable(
                "in-memory namespace marked unavailable".to_string(),
            ));
        }
        Ok(guard)
    }
}

impl SharedDefaults for MemorySharedDefaults {
    fn get(&self, key: &str) -> RepoResult<Option<SharedValue>> {
        Ok(self.available()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &SharedValue) -> RepoResult<()> {
        self.available()?
            .values
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.available()?.values.remove(key);
        Ok(())
    }

    fn write_batch(&self, entries: &[(&str, Option<SharedValue>)]) -> RepoResult<()> {
        let mut guard = self.available()?;
        apply_memory_entries(&mut guard, entries);
        Ok(())
    }

    fn compare_and_write(
        &self,
        guard_key: &str,
        expected: Option<&SharedValue>,
        entries: &[(&str, Option<SharedValue>)],
    ) -> RepoResult<bool> {
        let mut guard = self.available()?;
        if guard.values.get(guard_key) != expected {
            return Ok(false);
        }
        apply_memory_entries(&mut guard, entries);
        Ok(true)
    }
}

fn apply_memory_entries(state: &mut MemoryState, entries: &[(&str, Option<SharedValue>)]) {
    for (key, value) in entries {
        match value {
            Some(value) => {
                state.values.insert((*key).to_string(), value.clone());
            }
            None => {
                state.values.remove(*key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MemorySharedDefaults, RepoError, SharedDefaults, SharedValue, SqliteSharedDefaults,
        CHECKED_ITEMS_KEY, LAST_EAT_DATE_KEY, LAST_RESET_DATE_KEY,
    };
    use crate::db::open_db_in_memory;
    use chrono::{TimeZone, Utc};

    #[test]
    fn sqlite_set_get_remove() {
        let conn = open_db_in_memory().unwrap();
        let defaults = SqliteSharedDefaults::new(&conn);

        let list = SharedValue::StringList(vec!["Lunch".to_string()]);
        defaults.set(CHECKED_ITEMS_KEY, &list).unwrap();
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), Some(list));

        defaults.remove(CHECKED_ITEMS_KEY).unwrap();
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), None);
    }

    #[test]
    fn sqlite_rejects_undecodable_value() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO shared_defaults (key, value) VALUES (?1, 'not json');",
            [LAST_EAT_DATE_KEY],
        )
        .unwrap();

        let err = SqliteSharedDefaults::new(&conn)
            .get(LAST_EAT_DATE_KEY)
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn typed_reads_reject_mismatched_kinds() {
        let defaults = MemorySharedDefaults::new();
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        defaults
            .set(CHECKED_ITEMS_KEY, &SharedValue::Timestamp(instant))
            .unwrap();

        assert!(matches!(
            defaults.string_list(CHECKED_ITEMS_KEY),
            Err(RepoError::InvalidData(_))
        ));
        assert_eq!(defaults.timestamp(CHECKED_ITEMS_KEY).unwrap(), Some(instant));
    }

    #[test]
    fn unavailable_memory_defaults_fail_every_call() {
        let defaults = MemorySharedDefaults::new();
        defaults.set_unavailable(true);
        assert!(matches!(
            defaults.get(CHECKED_ITEMS_KEY),
            Err(RepoError::StorageUnavailable(_))
        ));
        assert!(defaults.write_batch(&[(CHECKED_ITEMS_KEY, None)]).is_err());
    }

    #[test]
    fn compare_and_write_skips_when_guard_changed() {
        let defaults = MemorySharedDefaults::new();
        let yesterday = SharedValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let today = SharedValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 0, 5, 0).unwrap());
        let lunch = SharedValue::StringList(vec!["Lunch".to_string()]);
        defaults.set(LAST_RESET_DATE_KEY, &today).unwrap();
        defaults.set(CHECKED_ITEMS_KEY, &lunch).unwrap();

        let applied = defaults
            .compare_and_write(
                LAST_RESET_DATE_KEY,
                Some(&yesterday),
                &[(CHECKED_ITEMS_KEY, Some(SharedValue::StringList(Vec::new())))],
            )
            .unwrap();
        assert!(!applied);
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), Some(lunch));

        let applied = defaults
            .compare_and_write(LAST_RESET_DATE_KEY, Some(&today), &[(CHECKED_ITEMS_KEY, None)])
            .unwrap();
        assert!(applied);
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), None);
    }

    #[test]
    fn sqlite_compare_and_write_checks_guard_in_transaction() {
        let conn = open_db_in_memory().unwrap();
        let defaults = SqliteSharedDefaults::new(&conn);
        let stamp = SharedValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 0, 5, 0).unwrap());
        let cleared = SharedValue::StringList(Vec::new());

        let entries = [(CHECKED_ITEMS_KEY, Some(cleared.clone()))];
        assert!(defaults
            .compare_and_write(LAST_RESET_DATE_KEY, None, &entries)
            .unwrap());
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), Some(cleared));

        defaults.set(LAST_RESET_DATE_KEY, &stamp).unwrap();
        assert!(!defaults
            .compare_and_write(LAST_RESET_DATE_KEY, None, &[(CHECKED_ITEMS_KEY, None)])
            .unwrap());
        assert!(defaults.get(CHECKED_ITEMS_KEY).unwrap().is_some());

        assert!(defaults
            .compare_and_write(LAST_RESET_DATE_KEY, Some(&stamp), &[(CHECKED_ITEMS_KEY, None)])
            .unwrap());
        assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), None);
    }
}
