//! User operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

impl Database {
    /// Look up a user by handle, creating them on first contact.
    ///
    /// Idempotent: repeated calls with the same handle return the same id.
    pub fn create_or_get_user(&self, handle: &str) -> Result<i64> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(Error::InvalidData("empty user handle".into()));
        }

        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM users WHERE handle = ?",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute("INSERT INTO users (handle) VALUES (?)", params![handle])?;
        let id = conn.last_insert_rowid();
        tracing::info!(user_id = id, "Created new user");
        Ok(id)
    }

    /// Fetch a user by id
    pub fn get_user(&self, user_id: i64) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT user_id, handle, created_at, updated_at FROM users WHERE user_id = ?",
            params![user_id],
            |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    handle: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                    updated_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Total number of registered users
    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// Bump a user's updated_at timestamp
    pub(crate) fn touch_user(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET updated_at = CURRENT_TIMESTAMP WHERE user_id = ?",
            params![user_id],
        )?;
        Ok(())
    }
}
