//! Session repository for issued token management
//!
//! Handles storage and lookup of the sessions backing signed tokens.
//! Tokens are stored as SHA-256 hashes for security.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::core::db::models::{CreateSession, Session};

/// Session repository error types
#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("Session not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let result = hasher.finalize();
        hex::encode(result)
    }

    /// Create a session from a DTO (token_hash should already be hashed)
    pub async fn create(&self, dto: &CreateSession) -> Result<Session, SessionRepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, dto).await
    }

    /// Insert a session on the caller's connection
    pub async fn insert(
        conn: &mut SqliteConnection,
        dto: &CreateSession,
    ) -> Result<Session, SessionRepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, account_id, token_hash, expires_at, ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, account_id, token_hash, expires_at, ip_address, user_agent, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dto.account_id)
        .bind(&dto.token_hash)
        .bind(dto.expires_at)
        .bind(&dto.ip_address)
        .bind(&dto.user_agent)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Find a session by raw token (will be hashed for lookup)
    pub async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, account_id, token_hash, expires_at, ip_address, user_agent, created_at
            FROM sessions
            WHERE token_hash = ?
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Return the session for a raw token only if it has not expired
    pub async fn find_live_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let now = Utc::now();
        Ok(self
            .find_by_token(raw_token)
            .await?
            .filter(|session| session.is_live(now)))
    }

    /// Delete a session by raw token. Deleting an absent session is not an error.
    pub async fn delete_by_token(&self, raw_token: &str) -> Result<bool, SessionRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all sessions for an account (logout from all devices)
    pub async fn delete_all_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<u64, SessionRepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::revoke_all(&mut conn, account_id).await
    }

    /// Delete all sessions for an account on the caller's connection
    pub async fn revoke_all(
        conn: &mut SqliteConnection,
        account_id: Uuid,
    ) -> Result<u64, SessionRepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count sessions for an account
    pub async fn count_for_account(&self, account_id: Uuid) -> Result<i64, SessionRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
