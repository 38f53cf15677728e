//! Account profile repository
//!
//! Personal details stored next to each account. Rows are written together
//! with the account they belong to.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::core::db::models::{AccountProfile, ProfileDetails};

/// Profile repository error types
#[derive(Debug, thiserror::Error)]
pub enum ProfileRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Profile repository for database operations
#[derive(Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the profile row for an account on the caller's connection
    pub async fn insert(
        conn: &mut SqliteConnection,
        account_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<AccountProfile, ProfileRepositoryError> {
        let now = Utc::now();
        let profile = sqlx::query_as::<_, AccountProfile>(
            r#"
            INSERT INTO account_profiles (account_id, full_name, phone, address, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING account_id, full_name, phone, address, created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(&details.full_name)
        .bind(&details.phone)
        .bind(&details.address)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(profile)
    }

    /// Find the profile of an account
    pub async fn find_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<AccountProfile>, ProfileRepositoryError> {
        let profile = sqlx::query_as::<_, AccountProfile>(
            r#"
            SELECT account_id, full_name, phone, address, created_at, updated_at
            FROM account_profiles
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}
