use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kbguard::api::{create_router, AppState};
use kbguard::config::Config;
use kbguard::db::{Database, DatabaseBackend, LibSqlBackend};
use kbguard::directory::build_directory;
use kbguard::embeddings::{Embedder, EmbeddingApiClient};

#[derive(Parser)]
#[command(name = "kbguard")]
#[command(about = "Permission-scoped retrieval over knowledge-base chunks")]
struct Args {
    /// Validate configuration and open the database, then exit
    #[arg(long)]
    check: bool,

    /// Override KBGUARD_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kbguard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    if config.server.api_keys.is_empty() {
        tracing::warn!("KBGUARD_API_KEYS is not set; all protected routes will return 401");
    }

    tracing::info!(url = %config.database.url, "Initializing database...");
    let raw_db = Database::new(&config.database, config.embeddings.dimensions).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(
        raw_db,
        config.store.metadata_key.clone(),
    )?);

    if args.check {
        tracing::info!("Configuration and database OK");
        return Ok(());
    }

    tracing::info!(
        model = %config.embeddings.model,
        dimensions = config.embeddings.dimensions,
        "Initializing embedding client..."
    );
    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingApiClient::from_config(&config.embeddings)?);

    tracing::info!(
        policy = %config.directory.failure_policy,
        ttl_secs = config.directory.cache_ttl_secs,
        "Initializing group directory..."
    );
    let directory = build_directory(&config.directory)?;

    let state = AppState::new(config.clone(), db, embedder, directory)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("kbguard starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
