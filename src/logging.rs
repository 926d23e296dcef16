//! Logging Setup
//!
//! Console logging via tracing-subscriber with env-filter support. Debug
//! mode adds daily-rolling file logs (default `.courier-relay/logs/`) and
//! returns the non-blocking writer guard, which must stay alive for the
//! lifetime of the process.

use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Logging configuration assembled from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    debug: bool,
    level: String,
    log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            debug: false,
            level: "info".to_string(),
            log_dir: PathBuf::from(".courier-relay").join("logs"),
        }
    }

    /// Enable debug mode: `debug` level plus file logging.
    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug = debug;
        if debug {
            self.level = "debug".to_string();
        }
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = dir;
        self
    }
}

/// Initialize the global tracing subscriber. Returns the file-writer guard
/// when debug mode is on; keep it alive until shutdown.
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier_relay={0},{0}", config.level)));

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    if config.debug {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "courier-relay.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        Ok(None)
    }
}
