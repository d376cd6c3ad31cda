//! Connection bootstrap utilities for the shared namespace.
//!
//! # Responsibility
//! - Resolve a namespace identifier to its SQLite file.
//! - Open file or in-memory SQLite connections.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Busy waits stay below the widget rendering budget.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_millis(250);
const NAMESPACE_DB_EXTENSION: &str = "sqlite3";

/// Returns the database file backing `namespace_id` inside `dir`.
///
/// # Errors
/// - Returns `InvalidNamespace` when the identifier is empty or contains
///   characters other than ASCII alphanumerics, `.`, `-` and `_`.
pub fn namespace_db_path(dir: impl AsRef<Path>, namespace_id: &str) -> DbResult<PathBuf> {
    let trimmed = namespace_id.trim();
    let valid = !trimmed.is_empty()
        && !trimmed.starts_with('.')
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if !valid {
        return Err(DbError::InvalidNamespace(namespace_id.to_string()));
    }

    Ok(dir
        .as_ref()
        .join(format!("{trimmed}.{NAMESPACE_DB_EXTENSION}")))
}

/// Opens the shared namespace `namespace_id` stored under `dir`.
///
/// The directory is created when missing.
///
/// # Side effects
/// - Emits `namespace_open` logging events with duration and status.
pub fn open_namespace(dir: impl AsRef<Path>, namespace_id: &str) -> DbResult<Connection> {
    let dir = dir.as_ref();
    let path = match namespace_db_path(dir, namespace_id) {
        Ok(path) => path,
        Err(err) => {
            error!(
                "event=namespace_open module=db status=error error_code=invalid_namespace error={}",
                err
            );
            return Err(err);
        }
    };

    if let Err(source) = std::fs::create_dir_all(dir) {
        let err = DbError::Io {
            path: dir.to_path_buf(),
            source,
        };
        error!(
            "event=namespace_open module=db status=error error_code=namespace_dir_failed error={}",
            err
        );
        return Err(err);
    }

    info!(
        "event=namespace_open module=db status=ok namespace={}",
        namespace_id.trim()
    );
    open_db(path)
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(&mut conn, "file", started_at)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(&mut conn, "memory", started_at)?;
    Ok(conn)
}

fn finish_open(conn: &mut Connection, mode: &str, started_at: Instant) -> DbResult<()> {
    match bootstrap_connection(conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::namespace_db_path;
    use crate::db::DbError;
    use std::path::Path;

    #[test]
    fn namespace_path_uses_identifier_as_file_stem() {
        let path = namespace_db_path("/shared", "group.com.example.SixEats").unwrap();
        assert_eq!(
            path,
            Path::new("/shared/group.com.example.SixEats.sqlite3")
        );
    }

    #[test]
    fn namespace_path_rejects_traversal_and_empty_ids() {
        for bad in ["", "   ", "../escape", "group/child", ".hidden"] {
            let err = namespace_db_path("/shared", bad).unwrap_err();
            assert!(matches!(err, DbError::InvalidNamespace(_)), "{bad}");
        }
    }
}
