use chrono::Utc;
use loveping_database::{DbError, with_connection};
use rusqlite::{OptionalExtension, Row};

/// A row from the `users` table.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub pass_hash: String,
    pub created_at: i64,
    pub spotify_refresh: Option<String>,
    pub spotify_linked_at: Option<i64>,
}

impl User {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            pass_hash: row.get("pass_hash")?,
            created_at: row.get("created_at")?,
            spotify_refresh: row.get("spotify_refresh")?,
            spotify_linked_at: row.get("spotify_linked_at")?,
        })
    }
}

/// Inserts a new user and returns the created row.
///
/// # Errors
///
/// * If the username already exists
/// * If a database error occurs
pub fn create_user(username: &str, pass_hash: &str) -> Result<User, DbError> {
    with_connection(|conn| {
        conn.execute(
            "INSERT INTO users (username, pass_hash, created_at) VALUES (?1, ?2, ?3)",
            (username, pass_hash, Utc::now().timestamp()),
        )?;

        conn.query_row(
            "SELECT * FROM users WHERE id = ?1",
            [conn.last_insert_rowid()],
            User::from_row,
        )
    })
}

/// # Errors
///
/// * If a database error occurs
pub fn get_user_by_username(username: &str) -> Result<Option<User>, DbError> {
    with_connection(|conn| {
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            [username],
            User::from_row,
        )
        .optional()
    })
}

/// # Errors
///
/// * If a database error occurs
pub fn get_user_by_id(user_id: u64) -> Result<Option<User>, DbError> {
    with_connection(|conn| {
        conn.query_row("SELECT * FROM users WHERE id = ?1", [user_id], User::from_row)
            .optional()
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_user_round_trip() {
        loveping_database::init(":memory:").unwrap();

        let created = create_user("alice", "hash").unwrap();
        assert_eq!(created.username, "alice");
        assert_eq!(created.spotify_refresh, None);

        let by_name = get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.pass_hash, "hash");

        let by_id = get_user_by_id(created.id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(get_user_by_username("bob").unwrap().is_none());

        assert!(matches!(
            create_user("alice", "other-hash"),
            Err(DbError::Sqlite(_))
        ));
    }
}
