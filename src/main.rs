use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;
use warden::core::auth::{AuthPolicy, JwtConfig, JwtService, SecretSource};
use warden::core::config::Config;
use warden::core::db::{DbConfig, create_pool_with_migrations};
use warden::core::server::{AppState, BackgroundTasks, bootstrap_superadmin, build_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Load application config from environment variables
    let config = Config::from_env();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Log config status (without revealing secrets)
    tracing::info!(
        database = %config.database_path,
        bind = %config.bind_addr,
        jwt_secret = config.has_jwt_secret(),
        "Config loaded"
    );

    let (jwt_config, source) = JwtConfig::from_configured(config.jwt_secret.as_deref());
    if source == SecretSource::Generated {
        tracing::warn!(
            "No usable JWT_SECRET configured; using a random signing secret. \
             Issued tokens will not survive a restart"
        );
    }

    let pool = create_pool_with_migrations(&DbConfig::new(&config.database_path)).await?;
    let state = AppState::new(pool, JwtService::new(jwt_config), AuthPolicy::default())
        .with_ip_source(config.client_ip_source());
    if config.trust_proxy_headers {
        tracing::info!("Client IPs taken from proxy headers");
    }

    bootstrap_superadmin(&state, &config.superadmin).await?;

    let tasks = BackgroundTasks::start(&state);
    let app = build_router(state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tasks.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
