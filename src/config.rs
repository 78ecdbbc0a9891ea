use {
    serde::{Deserialize, Serialize},
    std::path::PathBuf,
};

/// Where log output goes and how the log file is rolled.
///
/// The value is read once by [`configure`](crate::configure); changing it
/// afterwards has no effect on an already built logger. Every field is echoed
/// in the `logging configured` record emitted at startup.
///
/// # Examples
/// ```
/// use nlog::NLogConfig;
///
/// let config = NLogConfig {
///     output_file: true,
///     log_path: "./logs".into(),
///     log_file: "server.log".to_string(),
///     max_size: 50,
///     max_backups: 5,
///     max_age: 14,
///     ..NLogConfig::default()
/// };
/// assert!(config.output_console);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NLogConfig {
    /// Write formatted records to standard error.
    pub output_console: bool,
    /// Write formatted records to `{log_path}/{log_file}`.
    pub output_file: bool,
    /// Directory holding the active log file and its backups. Created
    /// recursively when file output is enabled.
    pub log_path: PathBuf,
    /// File name of the active log file inside `log_path`.
    pub log_file: String,
    /// Size in megabytes at which the log file is rolled. `0` selects the
    /// rolling writer's default of 100 MB.
    pub max_size: u64,
    /// Number of rolled backups to keep. `0` keeps all of them.
    pub max_backups: usize,
    /// Days to keep rolled backups. `0` disables age based removal.
    pub max_age: u64,
}

impl Default for NLogConfig {
    fn default() -> Self {
        NLogConfig {
            output_console: true,
            output_file: false,
            log_path: PathBuf::from("./logs"),
            log_file: "app.log".to_string(),
            max_size: 100,
            max_backups: 0,
            max_age: 0,
        }
    }
}

impl NLogConfig {
    /// Full path of the active log file.
    pub fn file_path(&self) -> PathBuf {
        self.log_path.join(&self.log_file)
    }
}
