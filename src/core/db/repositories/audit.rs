//! Audit repository
//!
//! Append-only storage for the security audit trail. Entries are never
//! updated or deleted through this repository.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::db::models::{AuditEntry, CreateAuditEntry};

/// Audit repository error types
#[derive(Debug, thiserror::Error)]
pub enum AuditRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Audit repository for database operations
#[derive(Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Create a new audit repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry
    pub async fn append(&self, dto: &CreateAuditEntry) -> Result<AuditEntry, AuditRepositoryError> {
        let entry = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO audit_entries (id, account_id, action, description, ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, account_id, action, description, ip_address, user_agent, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dto.account_id)
        .bind(dto.action)
        .bind(&dto.description)
        .bind(&dto.ip_address)
        .bind(&dto.user_agent)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Count entries, optionally restricted to one acting account
    pub async fn count(&self, account_id: Option<Uuid>) -> Result<i64, AuditRepositoryError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM audit_entries WHERE (?1 IS NULL OR account_id = ?1)",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// List entries newest first, optionally restricted to one acting account
    pub async fn list(
        &self,
        account_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEntry>, AuditRepositoryError> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, account_id, action, description, ip_address, user_agent, created_at
            FROM audit_entries
            WHERE (?1 IS NULL OR account_id = ?1)
            ORDER BY created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
