//! Credential & session service
//!
//! Verifies passwords, tracks failed attempts, enforces temporary lockout,
//! issues tokens backed by revocable session rows, and writes the audit trail.
//! Coordinates between the account, session and audit repositories and the
//! JWT service.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::core::auth::client_info::ClientInfo;
use crate::core::auth::jwt::{IssuedToken, JwtError, JwtService};
use crate::core::auth::locks::AccountLocks;
use crate::core::cache::ProfileCache;
use crate::core::db::models::{
    AuditAction, CreateAuditEntry, CreateSession, ProfileDetails, ProfileResponse, Role,
};
use crate::core::db::repositories::{
    AccountRepository, AccountRepositoryError, AuditRepository, AuditRepositoryError,
    BCRYPT_COST, FailedLoginUpdate, ProfileRepository, ProfileRepositoryError, Repositories,
    SessionRepository, SessionRepositoryError,
};

/// Failed attempts allowed before an account is locked
pub const MAX_FAILED_ATTEMPTS: i64 = 5;

/// Lockout duration in minutes
pub const LOCKOUT_MINUTES: i64 = 30;

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked. Try again in {remaining_minutes} minutes")]
    AccountLocked { remaining_minutes: i64 },

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session expired or revoked")]
    SessionExpiredOrRevoked,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Superadmin accounts cannot be modified")]
    ProtectedAccount,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AccountRepositoryError> for AuthError {
    fn from(err: AccountRepositoryError) -> Self {
        match err {
            AccountRepositoryError::NotFound => AuthError::AccountNotFound,
            AccountRepositoryError::EmailAlreadyExists => {
                AuthError::Conflict("Email already registered".to_string())
            }
            AccountRepositoryError::UsernameAlreadyExists => {
                AuthError::Conflict("Username already taken".to_string())
            }
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<SessionRepositoryError> for AuthError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::NotFound => AuthError::SessionExpiredOrRevoked,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<ProfileRepositoryError> for AuthError {
    fn from(err: ProfileRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<AuditRepositoryError> for AuthError {
    fn from(err: AuditRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken => AuthError::InvalidToken,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Whole minutes left on a lockout, rounded to the nearest minute
pub fn remaining_minutes(remaining: Duration) -> i64 {
    (remaining.num_seconds().max(0) + 30) / 60
}

/// Lockout and hashing parameters
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub max_failed_attempts: i64,
    pub lockout_duration: Duration,
    pub bcrypt_cost: u32,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::minutes(LOCKOUT_MINUTES),
            bcrypt_cost: BCRYPT_COST,
        }
    }
}

impl AuthPolicy {
    /// Set bcrypt cost
    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// State to persist after one more wrong password. Reaching the threshold
    /// sets the lockout and zeroes the counter.
    pub fn next_failure(&self, failed_login_count: i64, now: DateTime<Utc>) -> FailedLoginUpdate {
        let count = failed_login_count + 1;
        if count >= self.max_failed_attempts {
            FailedLoginUpdate {
                failed_login_count: 0,
                last_failed_login: now,
                locked_until: Some(now + self.lockout_duration),
            }
        } else {
            FailedLoginUpdate {
                failed_login_count: count,
                last_failed_login: now,
                locked_until: None,
            }
        }
    }
}

/// Identity resolved from a validated token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub role: Role,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    account_repo: AccountRepository,
    session_repo: SessionRepository,
    audit_repo: AuditRepository,
    profile_repo: ProfileRepository,
    jwt_service: JwtService,
    policy: AuthPolicy,
    locks: AccountLocks,
    profiles: ProfileCache,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        repos: &Repositories,
        jwt_service: JwtService,
        policy: AuthPolicy,
        locks: AccountLocks,
        profiles: ProfileCache,
    ) -> Self {
        Self {
            account_repo: repos.accounts.clone(),
            session_repo: repos.sessions.clone(),
            audit_repo: repos.audit.clone(),
            profile_repo: repos.profiles.clone(),
            jwt_service,
            policy,
            locks,
            profiles,
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    /// Verify credentials and issue a session-backed token
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        origin: &ClientInfo,
    ) -> Result<IssuedToken, AuthError> {
        let Some(account) = self.account_repo.find_by_email(email).await? else {
            tracing::warn!(email, ip = %origin.ip, "Login attempt for unknown account");
            return Err(AuthError::AccountNotFound);
        };

        let guard = self.locks.acquire(account.id).await;

        // Re-read under the lock so concurrent attempts see each other's writes
        let account = self
            .account_repo
            .find_by_id(account.id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let now = Utc::now();
        if let Some(locked_until) = account.active_lockout(now) {
            tracing::warn!(account_id = %account.id, %locked_until, "Login attempt on locked account");
            return Err(AuthError::AccountLocked {
                remaining_minutes: remaining_minutes(locked_until - now),
            });
        }

        if !self.verify_password(password, &account.password_hash).await? {
            let update = self.policy.next_failure(account.failed_login_count, now);
            self.account_repo.record_failed_login(account.id, update).await?;

            match update.locked_until {
                Some(locked_until) => tracing::warn!(
                    account_id = %account.id,
                    ip = %origin.ip,
                    %locked_until,
                    "Account locked after repeated failed logins"
                ),
                None => tracing::warn!(
                    account_id = %account.id,
                    ip = %origin.ip,
                    failed_count = update.failed_login_count,
                    "Failed login attempt"
                ),
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !account.active {
            tracing::warn!(account_id = %account.id, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let issued = self.jwt_service.generate_token(account.id, account.role)?;

        let mut tx = self.account_repo.pool().begin().await?;
        AccountRepository::mark_login_success(&mut *tx, account.id, now).await?;
        SessionRepository::insert(
            &mut *tx,
            &CreateSession {
                account_id: account.id,
                token_hash: SessionRepository::hash_token(&issued.token),
                expires_at: issued.expires_at,
                ip_address: origin.ip.clone(),
                user_agent: origin.user_agent.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        drop(guard);

        // Cached summary carries the previous last_login
        self.profiles.delete(&account.id).await;

        self.record_audit(account.id, AuditAction::Login, "User logged in", origin)
            .await;

        tracing::info!(account_id = %account.id, ip = %origin.ip, "User logged in");
        Ok(issued)
    }

    /// Resolve a token to its account. The signature check and the session
    /// lookup are separate steps; both must pass.
    pub async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        let account_id = claims.account_id()?;

        let session = self
            .session_repo
            .find_live_by_token(token)
            .await?
            .ok_or(AuthError::SessionExpiredOrRevoked)?;

        if session.account_id != account_id {
            return Err(AuthError::InvalidToken);
        }

        Ok(AuthContext {
            account_id,
            role: claims.role,
        })
    }

    /// Revoke the session behind a token. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str, origin: &ClientInfo) -> Result<(), AuthError> {
        if let Ok(ctx) = self.validate_token(token).await {
            self.record_audit(ctx.account_id, AuditAction::Logout, "User logged out", origin)
                .await;
            tracing::info!(account_id = %ctx.account_id, "User logged out");
        }

        self.session_repo.delete_by_token(token).await?;
        Ok(())
    }

    /// Account summary with its profile
    pub async fn get_profile(&self, account_id: Uuid) -> Result<ProfileResponse, AuthError> {
        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let profile = self
            .profile_repo
            .find_by_account(account_id)
            .await?
            .map(ProfileDetails::from)
            .unwrap_or_default();

        Ok(ProfileResponse {
            account: account.into(),
            profile,
        })
    }

    /// Append an audit entry. Failures are logged and never surface to the caller.
    pub async fn record_audit(
        &self,
        account_id: Uuid,
        action: AuditAction,
        description: impl Into<String>,
        origin: &ClientInfo,
    ) {
        let entry = CreateAuditEntry {
            account_id,
            action,
            description: description.into(),
            ip_address: origin.ip.clone(),
            user_agent: origin.user_agent.clone(),
        };

        if let Err(err) = self.audit_repo.append(&entry).await {
            tracing::error!(%account_id, %action, error = %err, "Failed to write audit entry");
        }
    }

    /// Hash a password off the async executor
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.policy.bcrypt_cost;
        tokio::task::spawn_blocking(move || AccountRepository::hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(AuthError::from)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || AccountRepository::verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(AuthError::from)
    }
}
