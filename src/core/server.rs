//! HTTP application assembly
//!
//! Shared state, the route table with its guards, startup seeding of the
//! superadmin account, and the background maintenance tasks.

use std::time::Duration;

use axum::{
    Extension, Json, Router, middleware,
    routing::{get, post},
};
use rand::{Rng, distributions::Alphanumeric};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::core::admin::{AdminService, admin_routes};
use crate::core::auth::api::{login_handler, logout_handler, profile_handler};
use crate::core::auth::{
    AccountLocks, AuthError, AuthPolicy, AuthService, ClientIpSource, JwtService, require_auth,
};
use crate::core::cache::{self, ProfileCache};
use crate::core::config::BootstrapAccount;
use crate::core::db::models::{CreateAccount, ProfileDetails, ProfileResponse, Role};
use crate::core::db::repositories::{AccountRepository, Repositories};
use crate::core::rate_limiter::{self, RateLimiterRegistry, limit_by_client};
use crate::core::sweeper::SweeperHandle;

/// Length of a generated bootstrap password
const GENERATED_PASSWORD_LENGTH: usize = 20;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub admin: AdminService,
    pub accounts: AccountRepository,
    pub profiles: ProfileCache,
    pub limiter: RateLimiterRegistry,
    pub ip_source: ClientIpSource,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt_service: JwtService, policy: AuthPolicy) -> Self {
        let repos = Repositories::new(pool);
        let auth = AuthService::new(
            &repos,
            jwt_service,
            policy,
            AccountLocks::new(),
            ProfileCache::new(),
        );
        let admin = AdminService::new(auth.clone(), &repos);

        Self {
            profiles: auth.profiles().clone(),
            auth,
            admin,
            accounts: repos.accounts,
            limiter: RateLimiterRegistry::for_login(),
            ip_source: ClientIpSource::default(),
        }
    }

    /// Choose where client IPs are read from
    pub fn with_ip_source(mut self, ip_source: ClientIpSource) -> Self {
        self.ip_source = ip_source;
        self
    }
}

/// Build the application router
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let login = Router::new()
        .route("/api/auth/login", post(login_handler))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            limit_by_client,
        ));

    let protected = Router::new()
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/profile", get(profile_handler))
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    let ip_source = state.ip_source;

    Router::new()
        .route("/health", get(health_handler))
        .merge(login)
        .merge(protected)
        .with_state(state)
        .layer(Extension(ip_source))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Create the superadmin account if none exists. Returns the account when
/// one was created.
pub async fn bootstrap_superadmin(
    state: &AppState,
    seed: &BootstrapAccount,
) -> Result<Option<ProfileResponse>, AuthError> {
    if state.accounts.count_by_role(Role::SuperAdmin).await? > 0 {
        tracing::debug!("Superadmin account present, skipping bootstrap");
        return Ok(None);
    }

    let (password, generated) = match &seed.password {
        Some(password) => (password.clone(), false),
        None => (generate_password(), true),
    };

    let password_hash = state.auth.hash_password(&password).await?;
    let profile = ProfileDetails::with_full_name(seed.full_name.clone());
    let account = state
        .accounts
        .create_with_profile(
            &CreateAccount {
                email: seed.email.clone(),
                username: seed.username.clone(),
                password_hash,
                role: Role::SuperAdmin,
                active: true,
            },
            &profile,
        )
        .await?;

    if generated {
        tracing::warn!(
            email = %account.email,
            password = %password,
            "Generated superadmin password; it will not be shown again"
        );
    }
    tracing::info!(account_id = %account.id, email = %account.email, "Superadmin account created");

    Ok(Some(ProfileResponse {
        account: account.into(),
        profile,
    }))
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Periodic maintenance running alongside the server
pub struct BackgroundTasks {
    sweepers: Vec<SweeperHandle>,
}

impl BackgroundTasks {
    /// Start the cache and rate-limiter sweepers
    pub fn start(state: &AppState) -> Self {
        Self {
            sweepers: vec![
                state.profiles.spawn_sweeper(cache::SWEEP_INTERVAL),
                state.limiter.spawn_sweeper(rate_limiter::SWEEP_INTERVAL),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.sweepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweepers.is_empty()
    }

    /// Stop every sweeper and wait for it to exit
    pub async fn stop(self) {
        for sweeper in self.sweepers {
            let name = sweeper.name();
            sweeper.stop().await;
            tracing::debug!(sweeper = name, "Background task stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::JwtConfig;
    use crate::core::db::pool::{DbConfig, create_pool_with_migrations};

    async fn state() -> AppState {
        let pool = create_pool_with_migrations(&DbConfig::in_memory())
            .await
            .unwrap();
        AppState::new(
            pool,
            JwtService::new(JwtConfig::new("test_secret_key_for_testing_only_32bytes!")),
            AuthPolicy::default().bcrypt_cost(4),
        )
    }

    fn seed(password: Option<&str>) -> BootstrapAccount {
        BootstrapAccount {
            email: "root@x.com".to_string(),
            username: "root".to_string(),
            full_name: "Root Operator".to_string(),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_generate_password() {
        let first = generate_password();
        assert_eq!(first.len(), GENERATED_PASSWORD_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, generate_password());
    }

    #[tokio::test]
    async fn test_bootstrap_creates_superadmin_once() {
        let state = state().await;

        let created = bootstrap_superadmin(&state, &seed(Some("Boot-Pass-1")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.account.role, Role::SuperAdmin);
        assert_eq!(created.account.email, "root@x.com");
        assert_eq!(created.profile.full_name, "Root Operator");

        let stored = state.auth.get_profile(created.account.id).await.unwrap();
        assert_eq!(stored.profile.full_name, "Root Operator");

        assert!(
            bootstrap_superadmin(&state, &seed(Some("Other-Pass-2")))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            state.accounts.count_by_role(Role::SuperAdmin).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_bootstrap_with_generated_password() {
        let state = state().await;
        let created = bootstrap_superadmin(&state, &seed(None)).await.unwrap();
        assert!(created.is_some());
    }

    #[tokio::test]
    async fn test_background_tasks_start_and_stop() {
        let state = state().await;
        let tasks = BackgroundTasks::start(&state);
        assert_eq!(tasks.len(), 2);
        tasks.stop().await;
    }
}
