//! FarmHub Server: revision photo intake service.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use farmhub_api::{AppState, build_app};
use farmhub_core::config::AppConfig;
use farmhub_core::error::AppError;
use farmhub_database::DatabasePool;
use farmhub_service::RevisionService;
use farmhub_service::store::{PgCatalogStore, PgRevisionStore};
use farmhub_storage::LocalStorageProvider;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the `FARMHUB_ENV` overlay and `FARMHUB__*`
/// environment variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("FARMHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FarmHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    farmhub_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Storage root ─────────────────────────────────────
    let storage = LocalStorageProvider::new(&config.storage.root_path).await?;
    tracing::info!(root = %storage.root().display(), "Storage root ready");

    // ── Step 3: Revision service ─────────────────────────────────
    let revisions = RevisionService::new(
        Arc::new(PgCatalogStore::new(db.pool().clone())),
        Arc::new(PgRevisionStore::new(db.clone())),
        Arc::new(storage),
        &config.intake,
    );
    tracing::info!(
        workers = config.intake.effective_workers(),
        max_archive_bytes = config.intake.max_archive_bytes,
        max_members = config.intake.max_members,
        "Intake pipeline configured"
    );

    // ── Step 4: HTTP server ──────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let drain = revisions.clone();
    let app = build_app(AppState::new(config, revisions));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("FarmHub server listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut handle = tokio::spawn(async move { server.await });

    let served = tokio::select! {
        result = &mut handle => result,
        () = shutdown_signal() => {
            tracing::info!(grace_seconds = grace.as_secs(), "Shutdown signal received, draining requests");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Grace period elapsed, aborting in-flight requests");
                    handle.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    served
        .map_err(|e| AppError::internal(format!("Server task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // Mutations outlive aborted requests; let them settle before the pool closes.
    if tokio::time::timeout(grace, drain.shutdown()).await.is_err() {
        tracing::warn!("Revision operations still running at exit");
    }

    db.close().await;
    tracing::info!("FarmHub server stopped");
    Ok(())
}

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
        () = ctrl_c => {},
        () = terminate => {},
    }
}
