//! Administrative account operations
//!
//! Every operation re-checks that the caller is a superadmin, independent of
//! the route guard, and records an audit entry on success. Superadmin
//! accounts cannot be targeted by password resets or status changes.

use chrono::Utc;
use uuid::Uuid;

use crate::core::auth::{AuthContext, AuthError, AuthService, ClientInfo};
use crate::core::cache::ProfileCache;
use crate::core::db::models::{
    Account, AccountResponse, AuditAction, AuditEntry, CreateAccount, ProfileDetails,
    ProfileResponse, Role,
};
use crate::core::db::repositories::{
    AccountRepository, AuditRepository, Repositories, SessionRepository,
};
use crate::core::pagination::{Page, PageParams};

/// Fail with `Forbidden` unless the caller is a superadmin
pub fn ensure_superadmin(actor: &AuthContext) -> Result<(), AuthError> {
    match actor.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin | Role::Customer => {
            tracing::warn!(account_id = %actor.account_id, role = %actor.role, "Admin operation refused");
            Err(AuthError::Forbidden)
        }
    }
}

/// Data for a new admin account
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Administrative service
#[derive(Clone)]
pub struct AdminService {
    auth: AuthService,
    account_repo: AccountRepository,
    audit_repo: AuditRepository,
    profiles: ProfileCache,
}

impl AdminService {
    /// Shares the profile cache of `auth`
    pub fn new(auth: AuthService, repos: &Repositories) -> Self {
        Self {
            profiles: auth.profiles().clone(),
            account_repo: repos.accounts.clone(),
            audit_repo: repos.audit.clone(),
            auth,
        }
    }

    /// Create an account with the admin role
    pub async fn create_admin(
        &self,
        actor: &AuthContext,
        new_admin: NewAdmin,
        origin: &ClientInfo,
    ) -> Result<ProfileResponse, AuthError> {
        ensure_superadmin(actor)?;

        let password_hash = self.auth.hash_password(&new_admin.password).await?;
        let profile = new_admin
            .full_name
            .map(ProfileDetails::with_full_name)
            .unwrap_or_default();
        let account = self
            .account_repo
            .create_with_profile(
                &CreateAccount {
                    email: new_admin.email,
                    username: new_admin.username,
                    password_hash,
                    role: Role::Admin,
                    active: true,
                },
                &profile,
            )
            .await?;

        self.auth
            .record_audit(
                actor.account_id,
                AuditAction::CreateUser,
                format!("Created admin account {} ({})", account.username, account.email),
                origin,
            )
            .await;

        tracing::info!(actor_id = %actor.account_id, account_id = %account.id, "Admin account created");
        Ok(ProfileResponse {
            account: account.into(),
            profile,
        })
    }

    /// Replace a target's password and revoke its sessions
    pub async fn reset_password(
        &self,
        actor: &AuthContext,
        target_id: Uuid,
        new_password: &str,
        origin: &ClientInfo,
    ) -> Result<(), AuthError> {
        ensure_superadmin(actor)?;

        let _guard = self.auth.locks().acquire(target_id).await;
        let target = self.mutable_target(actor, target_id).await?;

        let password_hash = self.auth.hash_password(new_password).await?;

        let mut tx = self.account_repo.pool().begin().await?;
        AccountRepository::update_password_hash(&mut *tx, target.id, &password_hash).await?;
        let revoked = SessionRepository::revoke_all(&mut *tx, target.id).await?;
        tx.commit().await?;
        self.profiles.delete(&target.id).await;

        self.auth
            .record_audit(
                actor.account_id,
                AuditAction::ResetPassword,
                format!("Reset password for {}", target.username),
                origin,
            )
            .await;

        tracing::info!(actor_id = %actor.account_id, account_id = %target.id, revoked, "Password reset");
        Ok(())
    }

    /// Activate or deactivate a target. Deactivation revokes its sessions.
    pub async fn update_status(
        &self,
        actor: &AuthContext,
        target_id: Uuid,
        active: bool,
        origin: &ClientInfo,
    ) -> Result<(), AuthError> {
        ensure_superadmin(actor)?;

        let _guard = self.auth.locks().acquire(target_id).await;
        let target = self.mutable_target(actor, target_id).await?;

        let mut tx = self.account_repo.pool().begin().await?;
        AccountRepository::set_active(&mut *tx, target.id, active).await?;
        if !active {
            SessionRepository::revoke_all(&mut *tx, target.id).await?;
        }
        tx.commit().await?;
        self.profiles.delete(&target.id).await;

        let verb = if active { "Activated" } else { "Deactivated" };
        self.auth
            .record_audit(
                actor.account_id,
                AuditAction::UpdateStatus,
                format!("{} account {}", verb, target.username),
                origin,
            )
            .await;

        tracing::info!(actor_id = %actor.account_id, account_id = %target.id, active, "Account status changed");
        Ok(())
    }

    /// Lift an active lockout
    pub async fn unlock_account(
        &self,
        actor: &AuthContext,
        target_id: Uuid,
        origin: &ClientInfo,
    ) -> Result<(), AuthError> {
        ensure_superadmin(actor)?;

        let _guard = self.auth.locks().acquire(target_id).await;
        let target = self
            .account_repo
            .find_by_id(target_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !target.is_locked(Utc::now()) {
            return Err(AuthError::InvalidState("Account is not locked".to_string()));
        }

        self.account_repo.clear_lockout(target.id).await?;
        self.profiles.delete(&target.id).await;

        self.auth
            .record_audit(
                actor.account_id,
                AuditAction::UnlockAccount,
                format!("Unlocked account {}", target.username),
                origin,
            )
            .await;

        tracing::info!(actor_id = %actor.account_id, account_id = %target.id, "Account unlocked");
        Ok(())
    }

    /// Admin accounts, oldest first
    pub async fn list_admins(
        &self,
        actor: &AuthContext,
        params: PageParams,
    ) -> Result<Page<AccountResponse>, AuthError> {
        ensure_superadmin(actor)?;

        let total = self.account_repo.count_by_role(Role::Admin).await?;
        let admins = self
            .account_repo
            .list_by_role(Role::Admin, params.limit(), params.offset())
            .await?;

        Ok(Page::new(admins, params, total).map(AccountResponse::from))
    }

    /// Audit entries, newest first, optionally for one acting account
    pub async fn list_audit_log(
        &self,
        actor: &AuthContext,
        account_id: Option<Uuid>,
        params: PageParams,
    ) -> Result<Page<AuditEntry>, AuthError> {
        ensure_superadmin(actor)?;

        let total = self.audit_repo.count(account_id).await?;
        let entries = self
            .audit_repo
            .list(account_id, params.limit(), params.offset())
            .await?;

        Ok(Page::new(entries, params, total))
    }

    /// Load a target that password resets and status changes may modify
    async fn mutable_target(
        &self,
        actor: &AuthContext,
        target_id: Uuid,
    ) -> Result<Account, AuthError> {
        let target = self
            .account_repo
            .find_by_id(target_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if target.role.is_protected() {
            tracing::warn!(actor_id = %actor.account_id, account_id = %target.id, "Attempt to modify protected account");
            return Err(AuthError::ProtectedAccount);
        }

        Ok(target)
    }
}
