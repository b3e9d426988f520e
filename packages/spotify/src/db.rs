//! Persistence for the per-user Spotify refresh token.

use chrono::Utc;
use loveping_database::{DbError, with_connection};
use rusqlite::OptionalExtension;

/// Stores the refresh token returned by the code exchange on the user's
/// row, stamping the link time.
///
/// # Errors
///
/// * If a database error occurs
pub fn save_refresh_token(user_id: u64, refresh_token: &str) -> Result<(), DbError> {
    with_connection(|conn| {
        conn.execute(
            "UPDATE users SET spotify_refresh = ?1, spotify_linked_at = ?2 WHERE id = ?3",
            (refresh_token, Utc::now().timestamp(), user_id),
        )
        .map(|_| ())
    })
}

/// The stored refresh token for `user_id`, or `None` when the account has
/// not been linked.
///
/// # Errors
///
/// * If a database error occurs
pub fn get_refresh_token(user_id: u64) -> Result<Option<String>, DbError> {
    with_connection(|conn| {
        conn.query_row(
            "SELECT spotify_refresh FROM users WHERE id = ?1",
            [user_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map(Option::flatten)
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn insert_user(username: &str) -> u64 {
        let id = with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (username, pass_hash, created_at) VALUES (?1, 'hash', 0)",
                [username],
            )?;

            Ok(conn.last_insert_rowid())
        })
        .unwrap();

        u64::try_from(id).unwrap()
    }

    #[test]
    fn test_refresh_token_round_trip() {
        loveping_database::init(":memory:").unwrap();

        let user_id = insert_user("alice");

        assert_eq!(get_refresh_token(user_id).unwrap(), None);

        save_refresh_token(user_id, "AQCk...").unwrap();

        assert_eq!(
            get_refresh_token(user_id).unwrap().as_deref(),
            Some("AQCk...")
        );

        assert_eq!(get_refresh_token(user_id + 1).unwrap(), None);
    }
}
