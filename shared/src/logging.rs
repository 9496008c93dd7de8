//! Shared logging utilities for consistent tracing across all workers

use crate::errors::{SharedError, SharedResult};
use crate::types::WorkerId;
use chrono::{DateTime, Utc};
use tracing::{error, info};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Build the subscriber filter for the given base level
pub fn filter_directives(log_level: &str) -> SharedResult<String> {
    let level = log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(SharedError::InvalidConfig {
            field: "log_level".to_string(),
            value: log_level.to_string(),
        });
    }

    Ok(format!(
        "orchestrator={level},prompt_orchestrator={level},shared={level},reqwest=warn,hyper=warn"
    ))
}

/// Initialize the stdout tracing subscriber
///
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing(log_level: &str) -> SharedResult<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = filter_directives(log_level)?;

    let _ = fmt()
        .with_env_filter(EnvFilter::new(&directives))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    Ok(())
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for worker-aware info logging
#[macro_export]
macro_rules! worker_info {
    ($worker:expr, $($arg:tt)*) => {
        tracing::info!(
            worker = %$worker,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for worker-aware warning logging
#[macro_export]
macro_rules! worker_warn {
    ($worker:expr, $($arg:tt)*) => {
        tracing::warn!(
            worker = %$worker,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for worker-aware error logging
#[macro_export]
macro_rules! worker_error {
    ($worker:expr, $($arg:tt)*) => {
        tracing::error!(
            worker = %$worker,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for worker-aware debug logging
#[macro_export]
macro_rules! worker_debug {
    ($worker:expr, $($arg:tt)*) => {
        tracing::debug!(
            worker = %$worker,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(worker: WorkerId, details: &str) {
    info!(
        worker = %worker,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(worker: WorkerId, reason: &str) {
    info!(
        worker = %worker,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(worker: WorkerId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        worker = %worker,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(worker: WorkerId, message: &str) {
    info!(
        worker = %worker,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// "prompt K of N", with K being 1-based
pub fn progress_label(position: u64, total: usize) -> String {
    format!("prompt {position} of {total}")
}

/// Progress through the backlog, as structured fields and in the message
pub fn log_progress(worker: WorkerId, position: u64, total: usize, details: &str) {
    info!(
        worker = %worker,
        timestamp = format_timestamp(),
        position,
        total,
        "📋 {}: {}",
        progress_label(position, total),
        details
    );
}
