use {
    crate::{
        config::NLogConfig,
        error::NLogError,
        format::{ColorPolicy, ConsoleFormat},
        roller::{Compression, RollingFile, RollingFileBuilder, RotationSize, TimeZone},
    },
    std::{fs, io, path::Path, sync::Mutex},
    tracing::{
        dispatcher,
        subscriber::{DefaultGuard, NoSubscriber},
        Dispatch,
    },
    tracing_subscriber::{
        filter::LevelFilter,
        fmt::{self, writer::BoxMakeWriter, MakeWriter},
        layer::SubscriberExt,
        Layer, Registry,
    },
};

#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;

/// Mode of the log directory when it has to be created.
const LOG_DIR_MODE: u32 = 0o744;

type SinkLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// An output a logger writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// The rolling log file.
    File,
    /// Standard error, or the writer given to [`Configurator::console_writer`].
    Console,
}

/// A configured logger.
///
/// Wraps a [`Dispatch`] that fans every record out to the active sinks. The
/// dispatch is not installed anywhere by construction: use
/// [`NLog::with_default`], [`NLog::set_default`] or [`NLog::init`].
#[derive(Clone)]
pub struct NLog {
    dispatch: Dispatch,
    sinks: Vec<SinkKind>,
}

impl NLog {
    /// The underlying dispatcher, for use with `tracing::dispatcher` APIs.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Sinks records are written to, file first. Empty when neither output is
    /// enabled or the file could not be set up and the console is off.
    pub fn sinks(&self) -> &[SinkKind] {
        &self.sinks
    }

    /// Run `f` with this logger as the current default.
    pub fn with_default<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the default for the current thread until the guard
    /// is dropped.
    #[must_use = "the logger is only the default until the guard is dropped"]
    pub fn set_default(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    /// Install this logger as the process wide default.
    pub fn init(self) -> Result<(), NLogError> {
        dispatcher::set_global_default(self.dispatch)?;
        Ok(())
    }
}

impl std::fmt::Debug for NLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NLog").field("sinks", &self.sinks).finish_non_exhaustive()
    }
}

impl From<NLog> for Dispatch {
    fn from(log: NLog) -> Self {
        log.dispatch
    }
}

/// Builds an [`NLog`] from an [`NLogConfig`].
///
/// [`configure`](crate::configure) covers the common case; the builder lets
/// an embedding application swap the console writer or adjust formatting and
/// file rolling beyond what the configuration value holds.
///
/// # Examples
/// ```
/// use nlog::{ColorPolicy, Configurator, NLogConfig};
///
/// let log = Configurator::new(NLogConfig::default())
///     .color(ColorPolicy::Disabled)
///     .millis(false)
///     .build();
/// log.with_default(|| tracing::info!(port = 8080, "listening"));
/// ```
pub struct Configurator {
    config: NLogConfig,
    console: BoxMakeWriter,
    fallback: BoxMakeWriter,
    color: ColorPolicy,
    millis: bool,
    caller: bool,
    max_level: LevelFilter,
    compression: Option<Compression>,
    time_zone: TimeZone,
    file_mode: Option<u32>,
}

impl Configurator {
    /// Start from `config`, writing console output to standard error with
    /// colors unless `NO_COLOR` is set.
    pub fn new(config: NLogConfig) -> Self {
        Configurator {
            config,
            console: BoxMakeWriter::new(io::stderr),
            fallback: BoxMakeWriter::new(io::stderr),
            color: ColorPolicy::from_env(false),
            millis: true,
            caller: true,
            max_level: LevelFilter::TRACE,
            compression: None,
            time_zone: TimeZone::UTC,
            file_mode: None,
        }
    }

    /// Write console output somewhere other than standard error.
    pub fn console_writer<M>(self, make_writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            console: BoxMakeWriter::new(make_writer),
            ..self
        }
    }

    /// Where setup errors go when no logger is installed yet. Defaults to
    /// standard error.
    pub fn fallback_writer<M>(self, make_writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            fallback: BoxMakeWriter::new(make_writer),
            ..self
        }
    }

    /// Prefer the given color policy. A non-empty `NO_COLOR` still turns
    /// colors off.
    pub fn color(self, color: ColorPolicy) -> Self {
        Self {
            color: ColorPolicy::from_env(!color.is_enabled()),
            ..self
        }
    }

    /// Disable colors on request; `NO_COLOR` still disables them when this
    /// is `false`.
    pub fn no_color(self, disabled: bool) -> Self {
        Self {
            color: ColorPolicy::from_env(disabled),
            ..self
        }
    }

    /// Include milliseconds in timestamps.
    pub fn millis(self, millis: bool) -> Self {
        Self { millis, ..self }
    }

    /// Include the `file:line >` caller column.
    pub fn caller(self, caller: bool) -> Self {
        Self { caller, ..self }
    }

    /// Drop records more verbose than `max_level`.
    pub fn max_level(self, max_level: impl Into<LevelFilter>) -> Self {
        Self {
            max_level: max_level.into(),
            ..self
        }
    }

    /// Compress rolled log files.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            compression: Some(compression),
            ..self
        }
    }

    /// Time zone of the timestamps in rolled file names.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self { time_zone, ..self }
    }

    /// Unix mode of created log files.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            file_mode: Some(mode),
            ..self
        }
    }

    /// Build the logger and emit the `logging configured` record through it.
    ///
    /// Never fails: if the log file cannot be set up the problem is reported
    /// through the logger that is current at this point (or, when there is
    /// none, a plain logger on the fallback writer), and the file sink is
    /// left out.
    pub fn build(mut self) -> NLog {
        let format = ConsoleFormat::new(self.color)
            .with_millis(self.millis)
            .with_caller(self.caller);

        let mut sinks = Vec::new();
        let mut layers: Vec<SinkLayer> = Vec::new();

        if self.config.output_file {
            let fallback = std::mem::replace(&mut self.fallback, BoxMakeWriter::new(io::sink));
            let file = with_fallback_logger(fallback, || self.rolling_file());
            if let Some(file) = file {
                layers.push(sink_layer(Mutex::new(file), format.clone()));
                sinks.push(SinkKind::File);
            }
        }
        if self.config.output_console {
            layers.push(sink_layer(self.console, format));
            sinks.push(SinkKind::Console);
        }

        let subscriber = Registry::default().with(layers).with(self.max_level);
        let log = NLog {
            dispatch: Dispatch::new(subscriber),
            sinks,
        };

        let config = &self.config;
        log.with_default(|| {
            tracing::info!(
                file_logging = config.output_file,
                console_logging = config.output_console,
                log_path = %config.log_path.display(),
                log_file = %config.log_file,
                max_size_mb = config.max_size,
                max_backups = config.max_backups,
                max_age_days = config.max_age,
                "logging configured"
            );
        });

        log
    }

    /// Set up the rolling file, reporting failures through the current
    /// default logger.
    fn rolling_file(&self) -> Option<RollingFile> {
        let config = &self.config;
        if let Err(err) = create_log_dir(&config.log_path) {
            tracing::error!(error = %err, path = %config.log_path.display(), "can't create log directory");
            return None;
        }

        let mut builder = RollingFileBuilder::new(&config.log_path, &config.log_file)
            .max_size(RotationSize::MB(config.max_size))
            .max_backups(config.max_backups)
            .max_age_days(config.max_age)
            .time_zone(self.time_zone);
        if let Some(compression) = self.compression {
            builder = builder.compression(compression);
        }
        if let Some(mode) = self.file_mode {
            builder = builder.file_mode(mode);
        }

        match builder.build() {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::error!(error = %err, path = %config.file_path().display(), "can't open log file");
                None
            }
        }
    }
}

/// Configure logging from `config`.
///
/// Equivalent to `Configurator::new(config.clone()).build()`.
///
/// # Examples
/// ```
/// let log = nlog::configure(&nlog::NLogConfig::default());
/// log.with_default(|| tracing::warn!(retries = 3, "upstream slow"));
/// ```
pub fn configure(config: &NLogConfig) -> NLog {
    Configurator::new(config.clone()).build()
}

/// Run `f` with a plain logger writing to `fallback` when no logger is
/// installed, so errors raised before logging is set up are not lost.
fn with_fallback_logger<T>(fallback: BoxMakeWriter, f: impl FnOnce() -> T) -> T {
    if !dispatcher::get_default(|current| current.is::<NoSubscriber>()) {
        return f();
    }
    let subscriber = fmt::fmt().with_ansi(false).with_writer(fallback).finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Wrap a sink in a formatting layer.
fn sink_layer<W>(make_writer: W, format: ConsoleFormat) -> SinkLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(format.color().is_enabled())
        .event_format(format)
        .with_writer(make_writer)
        .boxed()
}

/// Create the log directory and its parents.
fn create_log_dir(path: &Path) -> Result<(), NLogError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(LOG_DIR_MODE);
    builder
        .create(path)
        .map_err(|err| NLogError::CreateDirectoryFailed(path.to_path_buf(), err.to_string()))
}
