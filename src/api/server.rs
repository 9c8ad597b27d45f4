use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{
    services::{download_file, get_job, health, job_status, list_jobs, submit_download},
    state::AppState,
};
use crate::config::Config;
use crate::dispatch::SystemResolver;
use crate::engine;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes over a prepared state
pub fn router(state: AppState) -> Router {
    let form_limit = state.config.server.max_form_bytes.as_usize();

    Router::new()
        .route("/api/download", post(submit_download))
        .route("/api/status", get(job_status))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{id}", get(get_job))
        .route("/files/{id}/{*path}", get(download_file))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(form_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let engine = engine::from_config(&config.engine)
        .map_err(|e| format!("Failed to initialise download engine: {e}"))?;
    if !engine.is_available() {
        warn!(
            engine = engine.name(),
            binary = %config.engine.binary.display(),
            "Download engine not available, jobs will fail until it is installed"
        );
    }

    let address = config.server.bind_addr;
    let state = AppState::new(config, engine, Arc::new(SystemResolver))
        .map_err(|e| format!("Failed to open downloads root: {e}"))?;
    info!(
        root = %state.outputs.path().display(),
        engine = state.engine.name(),
        max_concurrent_jobs = ?state.config.worker.max_concurrent_jobs,
        "Job orchestration ready"
    );

    let listener = TcpListener::bind(address).await?;
    info!(%address, "grabbox listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
