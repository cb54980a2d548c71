use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

/// UTC timestamp with millisecond precision: `2026-02-17T00:59:15.920Z`.
struct MillisecondTime;

impl FormatTime for MillisecondTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = jiff::Zoned::now();
        write!(w, "{}", now.strftime("%Y-%m-%dT%H:%M:%S.%3fZ"))
    }
}

/// Initializes `tracing` for either mode: foreground logs colored to stdout,
/// background logs (no ANSI) append to `log_path`. Falls back to `info` when
/// `RUST_LOG` is unset or invalid.
pub fn init(foreground: bool, log_path: &Path) -> Result<()> {
    let (filter, using_default) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new("info"), true),
    };

    if foreground {
        tracing_subscriber::fmt()
            .with_timer(MillisecondTime)
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    } else {
        if let Some(parent) = log_path.parent() {
            crate::daemon::pidfile::ensure_dir(parent)?;
        }
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;
        let log_file = Arc::new(log_file);

        tracing_subscriber::fmt()
            .with_timer(MillisecondTime)
            .with_env_filter(filter)
            .with_writer(move || log_file.clone())
            .with_target(false)
            .with_thread_ids(false)
            .with_ansi(false)
            .compact()
            .init();
    }

    if using_default {
        tracing::info!("RUST_LOG not set or invalid, using default 'info' level");
    }
    Ok(())
}
