use crate::checker::{HealthStatus, SharedStatus};
use axum::{extract::State, routing::get, Json, Router};

pub const HEALTH_PORT: u16 = 10001;

async fn health(State(status): State<SharedStatus>) -> Json<HealthStatus> {
    Json(status.read().await.clone())
}

pub fn router(status: SharedStatus) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(status)
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

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

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
