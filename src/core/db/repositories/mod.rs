//! Database repositories for Warden
//!
//! This module provides repository implementations for database operations.
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with the store.

pub mod account;
pub mod audit;
pub mod profile;
pub mod session;

pub use account::{AccountRepository, AccountRepositoryError, BCRYPT_COST, FailedLoginUpdate};
pub use audit::{AuditRepository, AuditRepositoryError};
pub use profile::{ProfileRepository, ProfileRepositoryError};
pub use session::{SessionRepository, SessionRepositoryError};

use sqlx::SqlitePool;

/// One handle per table, all sharing a pool
#[derive(Clone)]
pub struct Repositories {
    pub accounts: AccountRepository,
    pub sessions: SessionRepository,
    pub audit: AuditRepository,
    pub profiles: ProfileRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool),
        }
    }
}
