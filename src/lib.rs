//! # NLog
//!
//! NLog sets up [`tracing`] output for an application from a small
//! configuration value: records go to standard error, to a size rolled log
//! file, to both, or nowhere. Every line uses the same compact layout with a
//! local timestamp, a colored three letter level tag and the caller:
//!
//! ```text
//! 19:55:00.042 |INF|           src/main.rs:12 > listening port=8080
//! ```
//!
//! Colors can be switched off by the application, and are always off when the
//! `NO_COLOR` environment variable is set to a non-empty value.
//!
//! The log file is handled by [`RollingFile`]: once it reaches its maximum
//! size it is renamed to a timestamped backup, and backups beyond a count or
//! age limit are removed (and, optionally, compressed).
//!
//! ## Example
//!
//! ```rust
//! use nlog::{configure, NLogConfig};
//!
//! fn main() {
//!     let dir = tempfile::tempdir().unwrap();
//!     let log = configure(&NLogConfig {
//!         output_console: true,
//!         output_file: true,
//!         log_path: dir.path().join("logs"),
//!         log_file: "app.log".to_string(),
//!         max_size: 10,
//!         max_backups: 3,
//!         max_age: 7,
//!     });
//!
//!     log.with_default(|| {
//!         tracing::info!("This is an info message");
//!         tracing::warn!(attempt = 2, "This is a warning message");
//!         tracing::error!("This is an error message");
//!     });
//! }
//! ```
//!
//! [`configure`] never fails. If the log directory cannot be created the error
//! is reported through whatever logger is current at that moment (standard
//! error when there is none) and the returned logger simply has no file sink.
mod config;
mod error;
mod format;
mod logger;
mod roller;

pub use {
    config::NLogConfig,
    error::NLogError,
    format::{
        format_caller, format_level, format_timestamp, level_token, ColorPolicy, ConsoleFormat, LocalClock,
        CALLER_WIDTH, LEVEL_DEBUG, LEVEL_ERROR, LEVEL_FATAL, LEVEL_INFO, LEVEL_PANIC, LEVEL_TRACE, LEVEL_WARN,
        NO_COLOR,
    },
    logger::{configure, Configurator, NLog, SinkKind},
    roller::{Compression, RollingFile, RollingFileBuilder, RotationSize, TimeZone, DEFAULT_MAX_SIZE},
};
