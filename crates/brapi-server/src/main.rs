//! BrAPI Server - Main entry point

use anyhow::Result;
use brapi_common::logging::{init_logging, LogConfig};
use brapi_ingest::{store, IngestPipeline};
use std::{future::IntoFuture, net::SocketAddr, time::Duration};
use tokio::signal;
use tracing::info;

use brapi_server::{config::Config, create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("brapi-server")
        .filter_directives(
            "brapi_server=debug,brapi_ingest=debug,tower_http=debug,sqlx=warn,mongodb=info",
        )
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting BrAPI Server");

    let config = Config::load()?;
    info!(
        backend = %config.ingest.backend.kind,
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let handle = store::connect(&config.ingest.backend).await?;
    let pipeline = IngestPipeline::from_settings(handle.clone(), &config.ingest.settings);
    pipeline.static_area().ensure_exists().await?;
    info!(
        static_dir = %pipeline.static_area().root().display(),
        "Static file area ready"
    );

    let app = create_router(AppState::new(pipeline), &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .into_future();

    // In-flight uploads get shutdown_timeout_secs to finish once a signal arrives
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(timeout).await;
        } => {
            tracing::warn!("Shutdown timeout elapsed, dropping remaining connections");
        },
    }

    handle.close().await;
    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
