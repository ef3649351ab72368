use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::types::User;
use super::{Store, new_id, now_rfc3339};

impl Store {
    /// Create the user on first login, refresh name and subject afterwards.
    /// The id stays stable across logins.
    pub async fn upsert_user(&self, email: &str, name: &str, google_sub: &str) -> Result<User> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO users (id, email, name, google_sub, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(email) DO UPDATE SET name = excluded.name, google_sub = excluded.google_sub",
            params![new_id(), email.trim().to_lowercase(), name, google_sub, now_rfc3339()],
        )?;
        let user = db.query_row(
            "SELECT id, email, name, google_sub, created_at FROM users WHERE email = ?1",
            params![email.trim().to_lowercase()],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    google_sub: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT id, email, name, google_sub, created_at FROM users WHERE email = ?1",
                params![email.trim().to_lowercase()],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        name: row.get(2)?,
                        google_sub: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }
}
