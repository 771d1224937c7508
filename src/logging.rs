//! Logging setup for the `housing-features` binary and embedding services.
//!
//! Console output always; an optional daily-rotated file in the platform data
//! directory (or a directory of your choosing).
//!
//! ## Usage
//!
//! ```no_run
//! use housing_features::logging::{self, LogOptions};
//!
//! // Initialize once at startup
//! logging::init(&LogOptions::default()).expect("Failed to initialize logging");
//!
//! tracing::info!("Service started");
//! ```
//!
//! `RUST_LOG` takes precedence over the defaults, e.g.
//! `RUST_LOG=housing_features::pipeline=debug` traces every stage.

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_FILE_PREFIX: &str = "housing-features";
const MAX_LOG_FILES: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Lower the default level from `info` to `debug`
    pub verbose: bool,

    /// Also write to rotating files
    pub file_logging: bool,

    /// Directory for log files, defaults to [`default_log_dir`]
    pub log_dir: Option<PathBuf>,
}

/// Platform log directory
///
/// Returns:
/// - Windows: `%APPDATA%/housing-features/logs`
/// - macOS: `~/Library/Application Support/housing-features/logs`
/// - Linux: `~/.local/share/housing-features/logs`
pub fn default_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("housing-features").join("logs"))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns error if the log directory cannot be created, the file appender
/// fails, or a subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(options.verbose)))
        .context("Failed to create env filter")?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let (file_layer, log_dir) = if options.file_logging {
        let log_dir = match &options.log_dir {
            Some(dir) => dir.clone(),
            None => default_log_dir()?,
        };
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(MAX_LOG_FILES)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&log_dir)
            .context("Failed to create log file appender")?;

        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false)
            .with_writer(appender);
        (Some(layer), Some(log_dir))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(dir) = log_dir {
        tracing::debug!("Logging initialized, log directory: {}", dir.display());
    }

    Ok(())
}
