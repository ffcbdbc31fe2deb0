use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

pub const LOG_FILE_PREFIX: &str = "request.log";

/// Event targets emitted by the normalizer and the loading binding.
const PIPELINE_TARGETS: [&str; 2] = ["request", "loading"];

/// Keeps the non-blocking writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Installs the global subscriber: one JSON line per event in a rolling
/// `request.log.*` file, with the `normalize_request` span (and its
/// `request_id`) attached, plus an optional WARN echo on stderr.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = pipeline_filter(logging_config)?;
    let log_dir = prepare_log_dir(&logging_config.dir)?;
    let expired = expired_log_files(
        &log_dir,
        LOG_FILE_PREFIX,
        logging_config.retention_days,
        SystemTime::now(),
    );
    let (writer, worker_guard) = file_writer(&log_dir, &logging_config.rotation);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter);

    let stderr_layer = logging_config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %logging_config.filter,
        pipeline_level = ?logging_config.pipeline_level,
        "logging_initialized"
    );

    let removed = remove_log_files(expired);
    if !removed.is_empty() {
        tracing::info!(target: "logging", removed = removed.len(), "expired_logs_removed");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
        log_dir,
    })
}

fn pipeline_filter(logging_config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = pipeline_directives(logging_config)?;
    EnvFilter::try_new(&directives)
        .with_context(|| format!("failed to parse logging.filter '{}'", directives))
}

/// `logging.filter`, with `pipeline_level` appended as a directive for every
/// pipeline target so request tracing can be turned up on its own.
fn pipeline_directives(logging_config: &LoggingConfig) -> Result<String> {
    let base = logging_config.filter.trim();
    if base.is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }

    let mut directives = vec![base.to_string()];
    if let Some(level) = &logging_config.pipeline_level {
        let parsed: LevelFilter = level
            .parse()
            .map_err(|_| anyhow!("invalid logging.pipeline_level '{}'", level))?;
        let level = parsed.to_string().to_ascii_lowercase();
        directives.extend(
            PIPELINE_TARGETS
                .iter()
                .map(|target| format!("{target}={level}")),
        );
    }
    Ok(directives.join(","))
}

fn prepare_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir cannot be empty"));
    }
    let log_dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to read current working directory for logging.dir")?
            .join(dir)
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;
    Ok(log_dir)
}

fn file_writer(log_dir: &Path, rotation: &LoggingRotation) -> (NonBlocking, WorkerGuard) {
    let appender: RollingFileAppender = match rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
    };
    tracing_appender::non_blocking(appender)
}

/// Prefixed log files last written before the retention window.
fn expired_log_files(
    log_dir: &Path,
    prefix: &str,
    retention_days: usize,
    now: SystemTime,
) -> Vec<PathBuf> {
    let retention = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60) as u64);
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);

    let Ok(entries) = fs::read_dir(log_dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .filter(|entry| {
            entry
                .metadata()
                .ok()
                .filter(|metadata| metadata.is_file())
                .and_then(|metadata| metadata.modified().ok())
                .is_some_and(|modified| modified <= cutoff)
        })
        .map(|entry| entry.path())
        .collect()
}

/// Best-effort removal; files that cannot be removed are logged and kept.
fn remove_log_files(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| match fs::remove_file(path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    target: "logging",
                    path = %path.display(),
                    error = %err,
                    "expired_log_not_removed"
                );
                false
            }
        })
        .collect()
}
