use axum::{extract::Request, ServiceExt};
use harbor::{Clock, SystemClock};
use server_http::{maintenance, routes, AppState};
use shared::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Harbor HTTP Server...");

    match dotenv {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    if let Err(e) = run(config).await {
        error!(error = %e, "Server stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // No remote client ships with the gateway; /tempo/data serves cached answers only.
    let state = AppState::open(&config, clock, None)?;
    if state.provider.is_none() {
        warn!("No data provider configured, TEMPO requests that miss the cache will get 503");
    }

    if config.cleanup_interval_secs > 0 {
        maintenance::spawn_artifact_cleanup(
            state.artifacts.clone(),
            Duration::from_secs(config.cleanup_interval_secs),
            config.artifact_retention_days,
        );
        info!(
            every_secs = config.cleanup_interval_secs,
            retention_days = config.artifact_retention_days,
            "Artifact cleanup scheduled"
        );
    }

    if config.cache_sweep_interval_secs > 0 {
        maintenance::spawn_cache_sweep(
            state.cache.clone(),
            Duration::from_secs(config.cache_sweep_interval_secs),
        );
        info!(every_secs = config.cache_sweep_interval_secs, "Cache sweep scheduled");
    }

    let app = routes::build_service(state, &config);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!("HTTP Server listening on http://{}", address);

    // Graceful shutdown handler
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
