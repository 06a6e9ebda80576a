//! Structured logging setup for the cafe POS core.
//!
//! Console layer plus a daily-rolling file layer under the directory the
//! embedding application chooses. The `RUST_LOG` filter is honored and
//! defaults to `info` globally with `debug` for this crate.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{PosError, PosResult};

/// Maximum number of rolled log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// Initialize logging (console + rolling file). Call once at startup;
/// installing a second global subscriber panics by design of tracing.
pub fn init(log_dir: &Path) -> PosResult<()> {
    fs::create_dir_all(log_dir).map_err(|e| PosError::io("create log dir", e))?;

    // Prune old log files before setting up the appender
    prune_old_logs(log_dir);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cafe_pos=debug"));

    let file_appender = tracing_appender::rolling::daily(log_dir, "cafe.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Dropping the guard flushes and stops the writer thread. The process
    // logs until exit, so leak it intentionally.
    std::mem::forget(guard);

    info!("Logging initialized at {}", log_dir.display());
    Ok(())
}

/// Prune old log files, keeping only the most recent [`MAX_LOG_FILES`].
pub fn prune_old_logs(log_dir: &Path) {
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("cafe.log") {
                        let modified = entry
                            .metadata()
                            .ok()
                            .and_then(|m| m.modified().ok())
                            .unwrap_or(std::time::UNIX_EPOCH);
                        log_files.push((path, modified));
                    }
                }
            }
        }
    }

    // Sort newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    // Remove files beyond the limit
    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
