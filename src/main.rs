//! ComplaintDesk API - internal complaint tracking
//!
//! Employees file complaints against a department and a person. Heads of
//! department answer with remarks that forward a complaint elsewhere or close
//! it, and every status change of a complaint leaves a department history row.
//!
//! STORAGE: with `DATABASE_URL` set the server persists to PostgreSQL;
//! without it everything lives in memory and is lost on shutdown.

mod attachments;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod registration;
mod remarks;
mod routes;
mod routing;
mod state;
mod users;
mod validation;
mod visibility;

#[cfg(test)]
mod testing;

use crate::attachments::LocalBlobStore;
use crate::config::Settings;
use crate::db::{memory::MemoryStore, postgres::PgStore, Store};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting ComplaintDesk API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.auth.jwt_secret == crate::config::DEV_JWT_SECRET {
        warn!("⚠️  JWT_SECRET not set, using default (INSECURE - set in production!)");
    }

    // Pick the backing store
    let store: Arc<dyn Store> = match &settings.database {
        Some(database) => {
            let pool = db::connect(database).await?;
            info!("✅ Database pool created successfully");
            db::init_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("⚠️  DATABASE_URL not set, using the in-memory store (data is lost on shutdown)");
            Arc::new(MemoryStore::new())
        }
    };

    let blobs = Arc::new(LocalBlobStore::new(&settings.media));
    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    let state = Arc::new(AppState::new(settings, store, blobs));

    if let Some(admin) = state.users.bootstrap_admin(&state.settings.bootstrap).await? {
        info!("👤 Bootstrap superuser {} is ready", admin.username);
    }

    // Build the router
    let app = create_router(state);

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/login             - Login with username/password");
    info!("   POST /api/auth/refresh           - Refresh access token");
    info!("   GET  /api/auth/me                - Current user and role");
    info!("   POST /api/auth/register          - Register an account (CEO, superuser, HOD)");
    info!("   POST /api/auth/password          - Change own password");
    info!("");
    info!("   ─── Directory ───");
    info!("   GET  /api/users                  - Users visible to the caller");
    info!("   PUT  /api/users/{{id}}/profile     - Edit own profile");
    info!("   GET  /api/departments            - List departments");
    info!("");
    info!("   ─── Complaints ───");
    info!("   GET  /api/complaints             - Complaints in the caller's scope");
    info!("   GET  /api/complaints/mine        - Complaints the caller takes part in");
    info!("   POST /api/complaints             - File a complaint");
    info!("   POST /api/complaints/{{id}}/remarks - Forward or close a complaint");
    info!("   GET  /api/complaints/{{id}}/history - Department history");
    info!("   POST /api/attachments            - Upload a file");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,complaintdesk_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
