mod checker;
mod checks;
mod config;
mod error;
mod logging;
mod server;

use std::net::{Ipv4Addr, SocketAddr};
use std::process;

use anyhow::Context;
use checker::HealthChecker;
use checks::HostPaths;
use dotenv::dotenv;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let _guard = logging::init_logger();

    if let Err(err) = run().await {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = cbin_core::config::config_path(None);
    let config = config::load_configuration(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!(?config, "Loaded configuration");

    let checker = HealthChecker::new(config, HostPaths::system());
    let app = server::router(checker.status());
    let checks = tokio::spawn(checker.run());

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, server::HEALTH_PORT));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Starting health check server");

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("serving health endpoint")?;

    checks.abort();
    info!("Graceful shutdown complete");
    Ok(())
}
