use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sendhooks_api::config::{AppConfig, LogFormat};
use sendhooks_api::router::build_app_router;
use sendhooks_api::service::HookQueryService;
use sendhooks_api::state::AppState;
use sendhooks_db::{HookStore, PgHookStore};
use sendhooks_events::{HookIngestor, RedisStreamClient};

const DEFAULT_LOG_FILTER: &str = "sendhooks_api=debug,sendhooks_events=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        stream = %config.ingestion.stream,
        group = %config.ingestion.group,
        "Loaded configuration"
    );

    // --- Database ---
    let pool = sendhooks_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    sendhooks_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    sendhooks_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn HookStore> = Arc::new(PgHookStore::new(pool));

    // --- Stream ---
    let redis_info = config
        .redis
        .connection_info()
        .context("Invalid Redis configuration")?;
    let stream = RedisStreamClient::connect(redis_info)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!(
        redis = %config.redis.display_target(),
        "Redis connection established"
    );

    // --- Ingestion ---
    let ingestion_cancel = CancellationToken::new();
    let ingestor = HookIngestor::new(stream, Arc::clone(&store), config.ingestion.clone());
    let ingestion_handle = tokio::spawn(ingestor.run(ingestion_cancel.clone()));

    // --- App state ---
    let state = AppState {
        hooks: HookQueryService::new(store),
    };

    let app = build_app_router(state, &config.server);

    // --- Start server ---
    let host = config
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid HOST address: {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping ingestion");

    ingestion_cancel.cancel();
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    match tokio::time::timeout(timeout, ingestion_handle).await {
        Ok(Ok(())) => tracing::info!("Hook ingestion stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Hook ingestion task failed"),
        Err(_) => tracing::warn!(?timeout, "Hook ingestion did not stop in time"),
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
