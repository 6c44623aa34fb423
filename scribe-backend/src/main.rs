//! Scribe backend - Main entry point
//!
//! Transcription job orchestrator: accepts jobs over HTTP, drives them
//! through the model services and stores the merged transcripts.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe_backend::config::{Args, ServiceConfig};
use scribe_backend::services::FfprobeProbe;
use scribe_backend::{build_router, start_service};

const DEFAULT_LOG_FILTER: &str = "scribe_backend=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before logging so the TOML level can seed the filter
    let config = ServiceConfig::resolve(&args);

    let fallback_filter = config
        .as_ref()
        .ok()
        .and_then(|c| c.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config.context("Failed to resolve configuration")?;

    match &config.config_file {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Starting Scribe backend on port {}", config.port);
    info!("Audio directory: {}", config.audio_dir.display());
    info!("Transcript directory: {}", config.transcript_dir.display());
    for stage in &config.stages {
        info!(
            stage = %stage.name,
            url = %stage.url,
            weight = stage.weight,
            role = ?stage.role,
            "Configured stage"
        );
    }

    let shutdown = CancellationToken::new();
    let service = start_service(&config, shutdown.clone())
        .context("Failed to initialize services")?;

    let health = service.state.orchestrator.check_health().await;
    if health.all_healthy {
        info!("All model services are healthy");
    } else {
        for service_health in health.services.iter().filter(|s| !s.healthy) {
            warn!(service = %service_health.service, "Model service is not available");
        }
    }

    if !FfprobeProbe::new(config.ffprobe_path.clone()).is_available() {
        warn!(
            ffprobe = %config.ffprobe_path,
            "ffprobe not found, transcripts will have no duration"
        );
    }

    let app = build_router(service.state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.workers.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
