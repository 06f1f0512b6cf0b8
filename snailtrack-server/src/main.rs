//! snailtrack-server - garden snail tracking service
//!
//! Serves the snail/sighting CRUD API, image uploads, and AI-assisted
//! re-identification over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use snailtrack_common::config::AuthMode;
use snailtrack_common::db::init_database;
use snailtrack_server::ai::OpenAiClient;
use snailtrack_server::api::BuildInfo;
use snailtrack_server::blob::LocalBlobStore;
use snailtrack_server::config::{Cli, ServerConfig};
use snailtrack_server::{build_router, AppState, Capabilities};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is needed for the default log level, so errors before tracing
    // init surface through anyhow only
    let config = ServerConfig::resolve(&cli).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    // Log build identification immediately after tracing init
    info!("Starting snailtrack-server {}", BuildInfo::current());

    info!("Root folder: {}", config.root.root().display());
    config.root.ensure_directory_exists()?;

    let db_path = config.root.database_path();
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    match config.auth.mode {
        AuthMode::Basic(_) => info!("Basic authentication enabled"),
        AuthMode::Disabled => warn!("API authentication disabled by configuration"),
        AuthMode::Locked => warn!("No credentials configured, every API request will be rejected"),
    }

    let capabilities = if config.ai.is_configured() {
        let client = OpenAiClient::new(&config.ai).context("Failed to create AI client")?;
        info!(
            vision_model = %config.ai.vision_model,
            embedding_model = %config.ai.embedding_model,
            "AI capabilities configured"
        );
        Capabilities::from_client(Arc::new(client))
    } else {
        warn!("No AI API key configured, AI endpoints will return errors");
        Capabilities::unconfigured()
    };

    info!(
        candidate_limit = config.matching.candidate_limit,
        top_n = config.matching.top_n,
        floor = config.matching.confidence_floor,
        strategy = %config.matching.identify_strategy,
        "Matching configured"
    );

    let images_dir = config.root.images_path();
    let blobs = Arc::new(LocalBlobStore::new(images_dir.clone(), &config.public_base_url));

    let state = AppState::new(
        pool,
        config.auth.clone(),
        capabilities,
        blobs,
        images_dir,
        config.matching.clone(),
    );
    let app = build_router(state);

    info!("Listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
