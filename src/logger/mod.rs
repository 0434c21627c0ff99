//! Structured logging for liquidity withdrawal runs
//!
//! Small, ergonomic logging API:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control (`--debug <tag>` on the CLI or `[logging] debug_tags`)
//! - Dual output: colored console + optional file sink
//! - Records emitted through the `log` crate by dependencies land in the same sink
//!
//! ## Usage
//!
//! ```rust
//! use liquidity_converge::logger::{self, LogTag};
//!
//! logger::info(LogTag::Controller, "Converged after 2 iterations");
//! logger::debug(LogTag::Ledger, "Raw owner info: ..."); // Only with --debug ledger
//! ```
//!
//! ## Initialization
//!
//! Call once at startup, before any logging occurs:
//! ```rust,no_run
//! use liquidity_converge::logger::{self, LoggerConfig};
//!
//! logger::init(LoggerConfig::default());
//! ```

mod bridge;
mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, update_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Installs the configuration, opens the file sink if one is configured and
/// routes `log` crate records through this logger. Safe to call more than
/// once; later calls only replace the configuration.
pub fn init(config: LoggerConfig) {
    let file_path = config.file_path.clone();
    set_logger_config(config);

    if let Some(path) = file_path {
        if let Err(e) = file::init_file_logging(&path) {
            eprintln!("⚠️  Failed to open log file '{}': {}", path.display(), e);
        }
    }

    bridge::install();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless min level is Error)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when debug is enabled for the tag.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush pending file writes
///
/// Call during shutdown so the tail of a run is on disk.
pub fn flush() {
    file::flush_file_logging();
}
