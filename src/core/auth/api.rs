//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/auth/login - Login and get a token
//! - POST /api/auth/logout - Revoke the presented token
//! - GET /api/profile - Get the caller's account summary and profile

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::auth::client_info::ClientInfo;
use crate::core::auth::gate::extract_bearer_token;
use crate::core::auth::service::{AuthContext, AuthError};
use crate::core::cache::PROFILE_TTL;
use crate::core::db::models::ProfileResponse;
use crate::core::server::AppState;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<i64>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            retry_after_minutes: None,
        }
    }

    pub fn retry_after(mut self, minutes: i64) -> Self {
        self.retry_after_minutes = Some(minutes);
        self
    }
}

impl AuthError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::AccountNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::AccountLocked { .. } => (StatusCode::UNAUTHORIZED, "ACCOUNT_LOCKED"),
            AuthError::AccountDisabled => (StatusCode::UNAUTHORIZED, "ACCOUNT_DISABLED"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::SessionExpiredOrRevoked => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AuthError::ProtectedAccount => (StatusCode::FORBIDDEN, "PROTECTED_ACCOUNT"),
            AuthError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS"),
            AuthError::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            AuthError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self {
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while handling request");
                ApiError::new("Internal server error", code)
            }
            AuthError::AccountLocked { remaining_minutes } => {
                ApiError::new(self.to_string(), code).retry_after(*remaining_minutes)
            }
            _ => ApiError::new(self.to_string(), code),
        };

        (status, Json(body)).into_response()
    }
}

/// Login request data
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued token
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Generic message response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// POST /api/auth/login
/// Verify credentials and issue a token
pub async fn login_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    tracing::debug!(email = %request.email, ip = %client.ip, "Login attempt");

    let issued = state
        .auth
        .authenticate(&request.email, &request.password, &client)
        .await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// POST /api/auth/logout
/// Revoke the session behind the presented token
pub async fn logout_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthError> {
    let token = extract_bearer_token(&headers)?;

    state.auth.logout(token, &client).await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// GET /api/profile
/// Caller's account summary, served from cache when fresh
pub async fn profile_handler(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<ProfileResponse>, AuthError> {
    if let Some(profile) = state.profiles.get(&ctx.account_id).await {
        return Ok(Json(profile));
    }

    let profile = state.auth.get_profile(ctx.account_id).await?;
    state
        .profiles
        .set(ctx.account_id, profile.clone(), PROFILE_TTL)
        .await;

    Ok(Json(profile))
}
