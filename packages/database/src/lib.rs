#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::{LazyLock, Mutex};

use rusqlite::Connection;
use thiserror::Error;

static DB: LazyLock<Mutex<Option<Connection>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized")]
    NotInitialized,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Opens the SQLite database at `path` and creates the schema if it is
/// missing. Replaces any previously opened connection.
///
/// # Errors
///
/// * If the database file cannot be opened
/// * If the schema fails to apply
pub fn init(path: &str) -> Result<(), DbError> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            pass_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            spotify_refresh TEXT,
            spotify_linked_at INTEGER
        );
        ",
    )?;

    log::debug!("Initialized database at {path}");

    DB.lock().unwrap_or_else(|e| e.into_inner()).replace(conn);

    Ok(())
}

/// Runs `f` against the process-wide connection.
///
/// # Errors
///
/// * If [`init`] has not been called
/// * If `f` returns an error
pub fn with_connection<T>(
    f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
) -> Result<T, DbError> {
    let guard = DB.lock().unwrap_or_else(|e| e.into_inner());
    let conn = guard.as_ref().ok_or(DbError::NotInitialized)?;

    Ok(f(conn)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_init_creates_users_table() {
        init(":memory:").unwrap();

        let count = with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get::<_, i64>(0),
            )
        })
        .unwrap();

        assert_eq!(count, 1);
    }
}
