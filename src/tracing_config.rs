//! Unified tracing configuration for rewrite-text
//!
//! Dual output to stderr (colored, compact) and a plain-text rolling file
//! with non-blocking writes and a runtime-adjustable level.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use tracing::Level;
use tracing_appender::{
    non_blocking::{NonBlockingBuilder, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Global guard to keep the non-blocking writer alive
static WORKER_GUARD: OnceCell<Mutex<Option<WorkerGuard>>> = OnceCell::new();

/// Current file log level (modified at runtime via atomic)
static FILE_LOG_LEVEL: AtomicU8 = AtomicU8::new(4);

fn level_to_u8(level: Level) -> u8 {
    match level {
        Level::ERROR => 1,
        Level::WARN => 2,
        Level::INFO => 3,
        Level::DEBUG => 4,
        Level::TRACE => 5,
    }
}

/// Parses a level name from settings. Unknown names yield `None`.
pub fn parse_level(name: &str) -> Option<Level> {
    name.trim().parse().ok()
}

/// Set the file log level dynamically at runtime.
pub fn set_file_log_level(level: Level) {
    FILE_LOG_LEVEL.store(level_to_u8(level), Ordering::Relaxed);
    tracing::debug!("File log level changed to {:?}", level);
}

/// Default log directory: `<data_local_dir>/rewrite-text/logs`.
pub fn default_log_dir() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(crate::settings::APP_DIR_NAME).join("logs"))
}

/// Initialize the tracing subscriber with dual output:
/// - Stderr: Colored, respects RUST_LOG (`debug` when `verbose`, else `info`)
/// - File: Plain text, daily rotation, 7 days retention, non-blocking
///
/// The worker guard is stored globally.
pub fn init_tracing(log_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(7)
        .filename_prefix("rewrite-text")
        .filename_suffix("log")
        .build(log_dir)?;

    // Don't drop logs under pressure
    let (non_blocking_writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(file_appender);

    WORKER_GUARD.get_or_init(|| Mutex::new(Some(guard)));

    let default_directive = if verbose { "debug" } else { "info" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Stdout carries command output; logs go to stderr.
    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(console_filter);

    // Reads FILE_LOG_LEVEL atomic to allow runtime changes
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_writer(non_blocking_writer)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            level_to_u8(*metadata.level()) <= FILE_LOG_LEVEL.load(Ordering::Relaxed)
        }));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Tracing initialized, log dir: {}", log_dir.display());

    Ok(())
}

/// Flushes the file writer. Call before the process exits.
pub fn shutdown_tracing() {
    if let Some(slot) = WORKER_GUARD.get() {
        slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_names() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_levels_are_ordered_by_verbosity() {
        assert!(level_to_u8(Level::ERROR) < level_to_u8(Level::INFO));
        assert!(level_to_u8(Level::INFO) < level_to_u8(Level::TRACE));
    }
}
