//! Refresh token storage.
//!
//! One row per user. Issuing a session overwrites the row, so only the most
//! recently issued refresh token is ever accepted for renewal.
//! Access tokens are never stored.

use sqlx::sqlite::SqlitePool;

use crate::session::SessionStore;

/// The stored refresh credential for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub user_id: i64,
    /// Sealed refresh token exactly as it was handed to the client
    pub encrypted_refresh_token: String,
    /// Unix timestamps (seconds)
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    user_id: i64,
    encrypted_refresh_token: String,
    expires_at: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<RefreshRow> for RefreshRecord {
    fn from(row: RefreshRow) -> Self {
        Self {
            user_id: row.user_id,
            encrypted_refresh_token: row.encrypted_refresh_token,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SQLite-backed store for refresh records.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete all records whose expiry is before `now`.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(to_db_time(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl SessionStore for RefreshTokenStore {
    async fn upsert_refresh(
        &self,
        user_id: i64,
        encrypted_refresh_token: &str,
        expires_at: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, encrypted_refresh_token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                encrypted_refresh_token = excluded.encrypted_refresh_token,
                expires_at = excluded.expires_at,
                updated_at = unixepoch()",
        )
        .bind(user_id)
        .bind(encrypted_refresh_token)
        .bind(to_db_time(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_refresh(&self, user_id: i64) -> Result<Option<RefreshRecord>, sqlx::Error> {
        let row: Option<RefreshRow> = sqlx::query_as(
            "SELECT user_id, encrypted_refresh_token, expires_at, created_at, updated_at FROM refresh_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshRecord::from))
    }

    async fn rotate_refresh(
        &self,
        user_id: i64,
        expected: &str,
        replacement: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET encrypted_refresh_token = ?, expires_at = ?, updated_at = unixepoch()
             WHERE user_id = ? AND encrypted_refresh_token = ?",
        )
        .bind(replacement)
        .bind(to_db_time(expires_at))
        .bind(user_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_refresh(&self, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_refresh_if(&self, user_id: i64, expected: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id = ? AND encrypted_refresh_token = ?",
        )
        .bind(user_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// SQLite integers are signed; clamp timestamps far in the future.
fn to_db_time(timestamp: u64) -> i64 {
    i64::try_from(timestamp).unwrap_or(i64::MAX)
}
