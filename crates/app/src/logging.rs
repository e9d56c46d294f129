use std::fs;
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Writes logs to stderr and a daily-rotated file under `log_file_dir`.
/// Level defaults to `log_level`, overridable with `RUST_LOG`.
pub fn init(log_file_dir: &str, log_level: &str) -> std::io::Result<WorkerGuard> {
    fs::create_dir_all(log_file_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_file_dir, "yatagarasu.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Deletes rotated log files older than `retention_days`. `0` disables
/// pruning entirely.
pub fn prune_old_logs(log_file_dir: &str, retention_days: u64) {
    if retention_days == 0 {
        tracing::debug!("log retention disabled (log_retention_days=0)");
        return;
    }

    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    let dir = Path::new(log_file_dir);
    if !dir.exists() {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read log directory for pruning");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !name.starts_with("yatagarasu.log.") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let modified: chrono::DateTime<Local> = modified.into();
        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "removed old log file"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove old log"),
            }
        }
    }
}
