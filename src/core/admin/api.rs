//! Admin API endpoints
//!
//! - GET /api/admin/dashboard - Staff landing (admin, superadmin)
//! - POST /api/admin/users - Create an admin account
//! - GET /api/admin/users/admins - List admin accounts
//! - POST /api/admin/users/reset-password - Reset a password
//! - POST /api/admin/users/update-status - Activate or deactivate an account
//! - POST /api/admin/users/unlock-account - Lift a lockout
//! - GET /api/admin/logs - Audit log
//!
//! All routes expect [`require_auth`](crate::core::auth::require_auth) to run
//! first.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::admin::service::NewAdmin;
use crate::core::auth::api::MessageResponse;
use crate::core::auth::{AuthContext, AuthError, ClientInfo, RoleSet, require_role};
use crate::core::db::models::{AccountResponse, AuditEntry, ProfileResponse, Role};
use crate::core::pagination::{Page, PageQuery};
use crate::core::server::AppState;

/// Request for creating an admin account
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Request for resetting a password
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
    pub password: String,
}

/// Request for changing the active flag
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub user_id: Uuid,
    pub active: bool,
}

/// Request for lifting a lockout
#[derive(Debug, Clone, Deserialize)]
pub struct UnlockAccountRequest {
    pub user_id: Uuid,
}

/// Audit log query (`?page=1&page_size=20&user_id=...`)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AuditLogQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub user_id: Option<Uuid>,
}

impl AuditLogQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub message: String,
    pub role: Role,
}

/// Admin routes with their role guards applied
pub fn admin_routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/api/admin/dashboard", get(dashboard_handler))
        .route_layer(middleware::from_fn_with_state(RoleSet::Staff, require_role));

    let superadmin = Router::new()
        .route("/api/admin/users", post(create_admin_handler))
        .route("/api/admin/users/admins", get(list_admins_handler))
        .route("/api/admin/users/reset-password", post(reset_password_handler))
        .route("/api/admin/users/update-status", post(update_status_handler))
        .route("/api/admin/users/unlock-account", post(unlock_account_handler))
        .route("/api/admin/logs", get(audit_log_handler))
        .route_layer(middleware::from_fn_with_state(RoleSet::SuperAdmin, require_role));

    staff.merge(superadmin)
}

/// GET /api/admin/dashboard
async fn dashboard_handler(ctx: AuthContext) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        message: "Welcome to the admin dashboard".to_string(),
        role: ctx.role,
    })
}

/// POST /api/admin/users
async fn create_admin_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    client: ClientInfo,
    Json(request): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), AuthError> {
    let account = state
        .admin
        .create_admin(
            &ctx,
            NewAdmin {
                email: request.email,
                username: request.username,
                password: request.password,
                full_name: request.full_name,
            },
            &client,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/admin/users/admins
async fn list_admins_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<AccountResponse>>, AuthError> {
    let page = state.admin.list_admins(&ctx, query.params()).await?;
    Ok(Json(page))
}

/// POST /api/admin/users/reset-password
async fn reset_password_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    client: ClientInfo,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .admin
        .reset_password(&ctx, request.user_id, &request.password, &client)
        .await?;

    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// POST /api/admin/users/update-status
async fn update_status_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    client: ClientInfo,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .admin
        .update_status(&ctx, request.user_id, request.active, &client)
        .await?;

    let message = if request.active {
        "Account activated"
    } else {
        "Account deactivated"
    };
    Ok(Json(MessageResponse::new(message)))
}

/// POST /api/admin/users/unlock-account
async fn unlock_account_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    client: ClientInfo,
    Json(request): Json<UnlockAccountRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .admin
        .unlock_account(&ctx, request.user_id, &client)
        .await?;

    Ok(Json(MessageResponse::new("Account unlocked")))
}

/// GET /api/admin/logs
async fn audit_log_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Page<AuditEntry>>, AuthError> {
    let page = state
        .admin
        .list_audit_log(&ctx, query.user_id, query.page_query().params())
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_password_request_deserialization() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"user_id": "{}", "password": "New-Password-1"}}"#, id);

        let request: ResetPasswordRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.user_id, id);
        assert_eq!(request.password, "New-Password-1");
    }

    #[test]
    fn test_create_admin_request_full_name_is_optional() {
        let json = r#"{"email": "o@x.com", "username": "olga", "password": "Pass-1"}"#;
        let request: CreateAdminRequest = serde_json::from_str(json).unwrap();
        assert!(request.full_name.is_none());

        let json = r#"{"email": "o@x.com", "username": "olga", "password": "Pass-1", "full_name": "Olga Ops"}"#;
        let request: CreateAdminRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.full_name.as_deref(), Some("Olga Ops"));
    }

    #[test]
    fn test_update_status_request_requires_active() {
        let json = format!(r#"{{"user_id": "{}"}}"#, Uuid::new_v4());
        assert!(serde_json::from_str::<UpdateStatusRequest>(&json).is_err());
    }

    #[test]
    fn test_audit_log_query_page_params() {
        let query = AuditLogQuery {
            page: Some(2),
            page_size: Some(1000),
            user_id: None,
        };
        let params = query.page_query().params();
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 100);
    }
}
