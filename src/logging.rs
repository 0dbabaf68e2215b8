//! Tracing setup.
//!
//! Logs go to systemd-journald when it is reachable, otherwise to a
//! daily-rolling file under the platform data directory. Verbosity is
//! controlled by the `WARDROBE_LOG` environment variable (standard
//! `EnvFilter` syntax, default `info`).

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Keeps the background log writer alive for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize global logging. Call once at startup.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let filter =
        EnvFilter::try_from_env("WARDROBE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    if init_journald(filter)? {
        return Ok(());
    }

    let dir = log_dir.unwrap_or_else(default_log_dir);
    init_file(dir)
}

#[cfg(target_os = "linux")]
fn init_journald(filter: EnvFilter) -> Result<bool> {
    match tracing_journald::layer() {
        Ok(layer) => {
            tracing_subscriber::registry().with(filter).with(layer).init();
            tracing::info!("logging to journald");
            Ok(true)
        }
        Err(_) => {
            // No journal socket; fall through to the file appender with
            // a fresh filter, EnvFilter is not Clone.
            Ok(false)
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn init_journald(_filter: EnvFilter) -> Result<bool> {
    Ok(false)
}

fn init_file(dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, "wardrobe.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let filter =
        EnvFilter::try_from_env("WARDROBE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    tracing::info!(dir = %dir.display(), "logging to rolling file");
    Ok(())
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wardrobe")
        .join("logs")
}
