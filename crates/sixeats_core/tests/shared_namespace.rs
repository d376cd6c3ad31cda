use chrono::{Duration, FixedOffset};
use rusqlite::Connection;
use sixeats_core::db::migrations::latest_version;
use sixeats_core::db::{namespace_db_path, open_db, open_db_in_memory, open_namespace, DbError};
use sixeats_core::repo::defaults_repo::CHECKED_ITEMS_KEY;
use sixeats_core::{
    ManualClock, Meal, MealStateStore, SharedDefaults, SharedValue, SqliteSharedDefaults,
    DEFAULT_NAMESPACE_ID,
};

fn clock() -> ManualClock {
    let utc = FixedOffset::east_opt(0).unwrap();
    ManualClock::at_local(utc, (2024, 6, 1), (8, 0)).unwrap()
}

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "shared_defaults");
}

#[test]
fn open_namespace_creates_directory_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let shared_dir = dir.path().join("App Group");

    let conn = open_namespace(&shared_dir, DEFAULT_NAMESPACE_ID).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(namespace_db_path(&shared_dir, DEFAULT_NAMESPACE_ID)
        .unwrap()
        .exists());
}

#[test]
fn open_namespace_rejects_misconfigured_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_namespace(dir.path(), "group/../../escape").unwrap_err();
    assert!(matches!(err, DbError::InvalidNamespace(_)));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn app_and_widget_connections_see_each_other_writes() {
    let dir = tempfile::tempdir().unwrap();
    let app_conn = open_namespace(dir.path(), DEFAULT_NAMESPACE_ID).unwrap();
    let widget_conn = open_namespace(dir.path(), DEFAULT_NAMESPACE_ID).unwrap();
    let clock = clock();

    let app = MealStateStore::new(SqliteSharedDefaults::new(&app_conn), &clock);
    let widget = MealStateStore::new(SqliteSharedDefaults::new(&widget_conn), &clock);

    app.toggle(Meal::Breakfast);
    assert!(widget.load_checked_items().contains("Breakfast"));
    assert_eq!(widget.load_last_eat_timestamp(), app.load_last_eat_timestamp());

    widget.toggle(Meal::Snack1);
    let seen_by_app = app.load_checked_items();
    assert!(seen_by_app.contains("Breakfast") && seen_by_app.contains("Snack 1"));
}

#[test]
fn state_persists_across_reopen_and_resets_next_day() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    {
        let conn = open_namespace(dir.path(), DEFAULT_NAMESPACE_ID).unwrap();
        let store = MealStateStore::new(SqliteSharedDefaults::new(&conn), &clock);
        store.toggle(Meal::Lunch);
    }

    let conn = open_namespace(dir.path(), DEFAULT_NAMESPACE_ID).unwrap();
    let store = MealStateStore::new(SqliteSharedDefaults::new(&conn), &clock);
    assert!(store.load_checked_items().contains("Lunch"));

    clock.advance(Duration::days(1));
    assert!(store.load_checked_items().is_empty());
    let stored = SqliteSharedDefaults::new(&conn)
        .get(CHECKED_ITEMS_KEY)
        .unwrap();
    assert_eq!(stored, Some(SharedValue::StringList(Vec::new())));
}

#[test]
fn write_batch_is_atomic() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_poison BEFORE INSERT ON shared_defaults
         WHEN NEW.key = 'poison'
         BEGIN SELECT RAISE(ABORT, 'poisoned'); END;",
    )
    .unwrap();
    let defaults = SqliteSharedDefaults::new(&conn);

    let result = defaults.write_batch(&[
        (CHECKED_ITEMS_KEY, Some(SharedValue::StringList(vec!["Lunch".to_string()]))),
        ("poison", Some(SharedValue::StringList(Vec::new()))),
    ]);

    assert!(result.is_err());
    assert_eq!(defaults.get(CHECKED_ITEMS_KEY).unwrap(), None);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
