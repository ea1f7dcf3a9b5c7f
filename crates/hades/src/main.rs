//! Hades Server
//!
//! Accepts event registration forms and serves the admin views over the
//! registrant tables.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hades::{
    auth::SessionStore,
    config::{AppConfig, DatabaseConfig, NotifyConfig},
    db::create_pool,
    handlers::{self, Services},
    notify::Notifier,
    services::{AccountService, AdminService, RegistrationService},
    state::AppState,
};

/// Initialize tracing/logging.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hades=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Hades");

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    let notify_config = NotifyConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load notification config, using defaults");
        NotifyConfig::default()
    });

    let active_tables = app_config
        .active_table_kinds()
        .map_err(|e| anyhow::anyhow!("invalid HADES_ACTIVE_TABLES: {}", e))?;

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        active_tables = ?app_config.active_tables,
        active_events = ?app_config.active_events,
        "Configuration loaded"
    );

    let db_pool = create_pool(&db_config).await?;
    let notifier = Notifier::from_config(&notify_config);
    let sessions = SessionStore::new(chrono::Duration::hours(app_config.session_ttl_hours));

    let services = Services {
        registration: RegistrationService::new(
            db_pool.clone(),
            notifier.clone(),
            active_tables,
            app_config.active_events.clone(),
        ),
        accounts: AccountService::new(db_pool.clone(), sessions, notifier.clone()),
        admin: AdminService::new(db_pool.clone(), notifier.clone()),
    };

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let state = AppState::new(db_pool, app_config, notifier);
    let app = handlers::router(state, services);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
