use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = "/var/log/cbin";
pub const LOG_FILE_NAME: &str = "cbin.log";

/// Install the global subscriber: human-readable stderr output, a daily
/// rolling JSON log under `LOG_DIR`, and a JSON `cbin.log` inside the
/// staging root when one is known. The returned guards flush the file
/// writers and must live until the process exits.
pub fn init_logger(staging_root: Option<&Path>) -> Vec<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_dir = env::var_os("LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

    let mut guards = Vec::new();

    let daily_layer = open_appender(&log_dir, Rotation::DAILY).map(|appender| {
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
    });

    let staging_layer = staging_root
        .and_then(|root| open_appender(root, Rotation::NEVER))
        .map(|appender| {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(true),
        )
        .with(daily_layer)
        .with(staging_layer)
        .with(filter_layer)
        .init();

    info!("Tracing is configured for stderr and file logging.");

    guards
}

fn open_appender(dir: &Path, rotation: Rotation) -> Option<RollingFileAppender> {
    match RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
    {
        Ok(appender) => Some(appender),
        Err(e) => {
            // The subscriber is not installed yet.
            eprintln!("cbin: cannot log to {}: {}", dir.display(), e);
            None
        }
    }
}
