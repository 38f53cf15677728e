//! Access-control gate
//!
//! Middleware run ahead of protected handlers:
//!
//! - `require_auth` resolves a bearer token to an [`AuthContext`] and attaches
//!   it to the request
//! - `require_role` admits only contexts whose role is in a [`RoleSet`]
//!
//! Handlers read the resolved identity through the [`AuthContext`] extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::core::auth::service::{AuthContext, AuthError, AuthService};
use crate::core::db::models::Role;

/// Named groups of roles a route may admit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSet {
    /// admin and superadmin
    Staff,
    /// superadmin only
    SuperAdmin,
}

impl RoleSet {
    pub fn contains(self, role: Role) -> bool {
        match role {
            Role::SuperAdmin => true,
            Role::Admin => match self {
                RoleSet::Staff => true,
                RoleSet::SuperAdmin => false,
            },
            Role::Customer => false,
        }
    }
}

const BEARER_PREFIX: &str = "Bearer ";

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token = auth_header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(AuthError::Unauthorized)?;

    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    Ok(token)
}

/// Check a resolved identity against an allowed role set
pub fn authorize(ctx: Option<&AuthContext>, allowed: RoleSet) -> Result<(), AuthError> {
    let ctx = ctx.ok_or(AuthError::Unauthorized)?;

    if allowed.contains(ctx.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Reject requests without a live session-backed token
pub async fn require_auth(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(req.headers())?;

    let ctx = match auth.validate_token(token).await {
        Ok(ctx) => ctx,
        Err(AuthError::Internal(msg)) => return Err(AuthError::Internal(msg)),
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return Err(AuthError::Unauthorized);
        }
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Reject requests whose role is not in the allowed set. Must run after
/// [`require_auth`].
pub async fn require_role(
    State(allowed): State<RoleSet>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = authorize(req.extensions().get::<AuthContext>(), allowed) {
        if let Some(ctx) = req.extensions().get::<AuthContext>() {
            tracing::warn!(account_id = %ctx.account_id, role = %ctx.role, path = %req.uri().path(), "Role check failed");
        }
        return Err(e);
    }

    Ok(next.run(req).await)
}

/// Identity attached by [`require_auth`]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            account_id: Uuid::new_v4(),
            role,
        }
    }

    // ========================================================================
    // Bearer Token Tests
    // ========================================================================

    #[test]
    fn test_extract_bearer_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer my_token_123"),
        );

        assert_eq!(extract_bearer_token(&headers).unwrap(), "my_token_123");
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_extract_bearer_token_invalid_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic base64credentials"),
        );

        assert!(matches!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));

        assert!(matches!(
            extract_bearer_token(&headers),
            Err(AuthError::Unauthorized)
        ));
    }

    // ========================================================================
    // Role Check Tests
    // ========================================================================

    #[test]
    fn test_role_set_membership() {
        assert!(RoleSet::Staff.contains(Role::SuperAdmin));
        assert!(RoleSet::Staff.contains(Role::Admin));
        assert!(!RoleSet::Staff.contains(Role::Customer));

        assert!(RoleSet::SuperAdmin.contains(Role::SuperAdmin));
        assert!(!RoleSet::SuperAdmin.contains(Role::Admin));
        assert!(!RoleSet::SuperAdmin.contains(Role::Customer));
    }

    #[test]
    fn test_authorize_without_context_is_unauthorized() {
        assert!(matches!(
            authorize(None, RoleSet::Staff),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_authorize_role_membership() {
        assert!(authorize(Some(&ctx(Role::Admin)), RoleSet::Staff).is_ok());
        assert!(authorize(Some(&ctx(Role::SuperAdmin)), RoleSet::Staff).is_ok());
        assert!(matches!(
            authorize(Some(&ctx(Role::Customer)), RoleSet::Staff),
            Err(AuthError::Forbidden)
        ));
        assert!(matches!(
            authorize(Some(&ctx(Role::Admin)), RoleSet::SuperAdmin),
            Err(AuthError::Forbidden)
        ));
    }
}
