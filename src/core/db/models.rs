//! Database models for Warden
//!
//! This module defines the entity structs that map to the SQLite tables
//! created by the embedded migrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Role
// ============================================================================

/// Account role. Stored as lowercase text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[display("customer")]
    Customer,
    #[display("admin")]
    Admin,
    #[display("superadmin")]
    SuperAdmin,
}

impl Role {
    /// Whether accounts with this role are shielded from being targeted by
    /// password resets and status changes.
    pub fn is_protected(self) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin | Role::Customer => false,
        }
    }
}

// ============================================================================
// Account Model
// ============================================================================

/// Account entity representing an identity with credentials and a role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing)]
    pub failed_login_count: i64,
    #[serde(skip_serializing)]
    pub last_failed_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Returns the lockout deadline if it is still in the future at `now`.
    pub fn active_lockout(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    /// Whether the account is locked at `now`
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.active_lockout(now).is_some()
    }
}

/// Account data for creation (password_hash must already be hashed)
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

/// Account without credential or lockout data (for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            role: account.role,
            active: account.active,
            last_login: account.last_login,
            created_at: account.created_at,
        }
    }
}

// ============================================================================
// Account Profile Model
// ============================================================================

/// Personal details kept alongside an account, one row per account
#[derive(Debug, Clone, FromRow)]
pub struct AccountProfile {
    pub account_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileDetails {
    pub fn with_full_name(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }
}

impl From<AccountProfile> for ProfileDetails {
    fn from(profile: AccountProfile) -> Self {
        Self {
            full_name: profile.full_name,
            phone: profile.phone,
            address: profile.address,
        }
    }
}

/// Account summary with its profile (served by `GET /api/profile`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    pub profile: ProfileDetails,
}

// ============================================================================
// Session Model
// ============================================================================

/// Session entity backing an issued token. Only the SHA-256 digest of the
/// token is persisted.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Session data for creation
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub account_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

// ============================================================================
// Audit Model
// ============================================================================

/// Kind of security-relevant action recorded in the audit trail
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AuditAction {
    #[display("login")]
    Login,
    #[display("logout")]
    Logout,
    #[display("create_user")]
    CreateUser,
    #[display("reset_password")]
    ResetPassword,
    #[display("update_status")]
    UpdateStatus,
    #[display("unlock_account")]
    UnlockAccount,
}

/// Immutable audit entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub action: AuditAction,
    pub description: String,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Audit entry data for creation
#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub account_id: Uuid,
    pub action: AuditAction,
    pub description: String,
    pub ip_address: String,
    pub user_agent: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            email: "user@x.com".to_string(),
            username: "user".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::Customer,
            active: true,
            failed_login_count: 0,
            last_failed_login: None,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), r#""superadmin""#);
        assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), r#""customer""#);
        let role: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_display_matches_storage_form() {
        assert_eq!(Role::SuperAdmin.to_string(), "superadmin");
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::Customer.to_string(), "customer");
    }

    #[test]
    fn test_only_superadmin_is_protected() {
        assert!(Role::SuperAdmin.is_protected());
        assert!(!Role::Admin.is_protected());
        assert!(!Role::Customer.is_protected());
    }

    #[test]
    fn test_audit_action_display() {
        assert_eq!(AuditAction::CreateUser.to_string(), "create_user");
        assert_eq!(AuditAction::UnlockAccount.to_string(), "unlock_account");
        assert_eq!(
            serde_json::to_string(&AuditAction::ResetPassword).unwrap(),
            r#""reset_password""#
        );
    }

    #[test]
    fn test_active_lockout_ignores_past_deadline() {
        let now = Utc::now();
        let mut account = sample_account();

        account.locked_until = Some(now - Duration::minutes(1));
        assert!(!account.is_locked(now));

        account.locked_until = Some(now + Duration::minutes(1));
        assert!(account.is_locked(now));
    }

    #[test]
    fn test_account_response_hides_credentials() {
        let account = sample_account();
        let json = serde_json::to_string(&AccountResponse::from(account)).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("hash"));
        assert!(json.contains("user@x.com"));
    }

    #[test]
    fn test_profile_response_nests_profile() {
        let response = ProfileResponse {
            account: AccountResponse::from(sample_account()),
            profile: ProfileDetails::with_full_name("Sam User"),
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["email"], "user@x.com");
        assert_eq!(json["profile"]["full_name"], "Sam User");
        assert_eq!(json["profile"]["phone"], "");
    }

    #[test]
    fn test_profile_details_fields_default() {
        let details: ProfileDetails = serde_json::from_str(r#"{"full_name": "Ops"}"#).unwrap();
        assert_eq!(details, ProfileDetails::with_full_name("Ops"));
    }

    #[test]
    fn test_session_is_live() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            token_hash: "abc".to_string(),
            expires_at: now,
            ip_address: String::new(),
            user_agent: String::new(),
            created_at: now,
        };
        // Strictly after now
        assert!(!session.is_live(now));
        assert!(session.is_live(now - Duration::seconds(1)));
    }
}
