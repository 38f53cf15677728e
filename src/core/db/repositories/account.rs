//! Account repository for database operations
//!
//! Provides lookup, creation and state updates for accounts, with password
//! hashing using bcrypt. Every query ignores soft-deleted rows.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::core::db::models::{Account, CreateAccount, ProfileDetails, Role};
use crate::core::db::repositories::profile::{ProfileRepository, ProfileRepositoryError};

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const BCRYPT_COST: u32 = 12;

/// Account repository error types
#[derive(Debug, thiserror::Error)]
pub enum AccountRepositoryError {
    #[error("Account not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Profile write failed: {0}")]
    ProfileError(#[from] ProfileRepositoryError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Failed-attempt bookkeeping written in a single statement
#[derive(Debug, Clone, Copy)]
pub struct FailedLoginUpdate {
    pub failed_login_count: i64,
    pub last_failed_login: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Account repository for database operations
#[derive(Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Create a new account repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash_password(password: &str, cost: u32) -> Result<String, AccountRepositoryError> {
        bcrypt::hash(password, cost).map_err(|e| AccountRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AccountRepositoryError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AccountRepositoryError::HashingError(e.to_string()))
    }

    /// Create an account from a CreateAccount struct with an empty profile
    pub async fn create(&self, dto: &CreateAccount) -> Result<Account, AccountRepositoryError> {
        self.create_with_profile(dto, &ProfileDetails::default()).await
    }

    /// Create an account and its profile row in one transaction
    pub async fn create_with_profile(
        &self,
        dto: &CreateAccount,
        profile: &ProfileDetails,
    ) -> Result<Account, AccountRepositoryError> {
        if self.find_by_email(&dto.email).await?.is_some() {
            return Err(AccountRepositoryError::EmailAlreadyExists);
        }

        if self.find_by_username(&dto.username).await?.is_some() {
            return Err(AccountRepositoryError::UsernameAlreadyExists);
        }

        let mut tx = self.pool.begin().await?;
        let account = Self::insert(&mut *tx, dto).await?;
        ProfileRepository::insert(&mut *tx, account.id, profile).await?;
        tx.commit().await?;

        Ok(account)
    }

    /// Insert an account row on the caller's connection
    pub async fn insert(
        conn: &mut SqliteConnection,
        dto: &CreateAccount,
    ) -> Result<Account, AccountRepositoryError> {
        let now = Utc::now();
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, username, password_hash, role, active,
                                  failed_login_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING id, email, username, password_hash, role, active, failed_login_count,
                      last_failed_login, locked_until, last_login, created_at, updated_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&dto.email)
        .bind(&dto.username)
        .bind(&dto.password_hash)
        .bind(dto.role)
        .bind(dto.active)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(Self::map_unique_violation)?;

        Ok(account)
    }

    /// A concurrent insert can still slip past the pre-checks; the unique
    /// indexes have the final word.
    fn map_unique_violation(err: sqlx::Error) -> AccountRepositoryError {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            if db_err.message().contains("username") {
                return AccountRepositoryError::UsernameAlreadyExists;
            }
            return AccountRepositoryError::EmailAlreadyExists;
        }
        AccountRepositoryError::DatabaseError(err)
    }

    /// Find an account by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AccountRepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, role, active, failed_login_count,
                   last_failed_login, locked_until, last_login, created_at, updated_at, deleted_at
            FROM accounts
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find an account by email
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, role, active, failed_login_count,
                   last_failed_login, locked_until, last_login, created_at, updated_at, deleted_at
            FROM accounts
            WHERE email = ? AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find an account by username
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, role, active, failed_login_count,
                   last_failed_login, locked_until, last_login, created_at, updated_at, deleted_at
            FROM accounts
            WHERE username = ? AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Persist the outcome of a failed password check
    pub async fn record_failed_login(
        &self,
        id: Uuid,
        update: FailedLoginUpdate,
    ) -> Result<(), AccountRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_count = ?, last_failed_login = ?, locked_until = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(update.failed_login_count)
        .bind(update.last_failed_login)
        .bind(update.locked_until)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Reset failure state and stamp the last login. Runs on the caller's
    /// connection so it can share a transaction with the session insert.
    pub async fn mark_login_success(
        conn: &mut SqliteConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AccountRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_count = 0, locked_until = NULL, last_login = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Replace the password hash (hash must already be computed). Runs on the
    /// caller's connection so session revocation can share its transaction.
    pub async fn update_password_hash(
        conn: &mut SqliteConnection,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AccountRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Activate or deactivate an account on the caller's connection
    pub async fn set_active(
        conn: &mut SqliteConnection,
        id: Uuid,
        active: bool,
    ) -> Result<(), AccountRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET active = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Lift a lockout and zero the failure counter
    pub async fn clear_lockout(&self, id: Uuid) -> Result<(), AccountRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET locked_until = NULL, failed_login_count = 0, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Count accounts holding a role
    pub async fn count_by_role(&self, role: Role) -> Result<i64, AccountRepositoryError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM accounts WHERE role = ? AND deleted_at IS NULL",
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// List accounts holding a role with pagination
    pub async fn list_by_role(
        &self,
        role: Role,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>, AccountRepositoryError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, role, active, failed_login_count,
                   last_failed_login, locked_until, last_login, created_at, updated_at, deleted_at
            FROM accounts
            WHERE role = ? AND deleted_at IS NULL
            ORDER BY created_at ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }
}
