//! Logging system configuration and initialization
//!
//! - Console output on stderr, so exported data can go to stdout
//! - Optional log file through a non-blocking appender
//! - Optional JSON formatting
//! - `RUST_LOG` overrides the configured level and module filters

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::default_log_dir;

pub const LOG_FILE_NAME: &str = "listscraper.log";

/// Dependencies that are noisy below `warn`
const QUIET_TARGETS: [&str; 5] = ["reqwest", "hyper", "hyper_util", "html5ever", "selectors"];

// Keeps the file writer alive for the life of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Local wall-clock timestamps
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Filter from `RUST_LOG`, else the configured level with dependency noise suppressed
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        for target in QUIET_TARGETS {
            filter = filter.add_directive(format!("{}=warn", target).parse()?);
        }
    }
    for (module, level) in &config.module_filters {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| anyhow!("Invalid module filter '{}={}': {}", module, level, e))?,
        );
    }
    Ok(filter)
}

/// Initialize logging; later calls leave the first subscriber in place
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(config)?;

    let console_layer = config.console_output.then(|| {
        if config.json_format {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimeFormatter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .boxed()
        }
    });

    let log_dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
    let file_layer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        let (file_writer, guard) = non_blocking(rolling::never(&log_dir, LOG_FILE_NAME));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry is poisoned"))?
            .push(guard);

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    if let Err(e) = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        debug!("Logging already initialized: {}", e);
        return Ok(());
    }

    info!("Logging initialized (level: {}, json: {})", config.level, config.json_format);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(LOG_FILE_NAME));
    }
    Ok(())
}

/// Log build and platform information
pub fn log_system_info() {
    info!("listscraper {}", env!("CARGO_PKG_VERSION"));
    debug!("Operating system: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        debug!("Working directory: {:?}", current_dir);
    }
}
