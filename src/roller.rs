//! Size based rolling log file.
//!
//! [`RollingFile`] writes to `{directory}/{filename}`. When a write would push
//! the file past its maximum size, the file is renamed to a timestamped backup
//! (`app-2025-04-01T19-55-00.000.log` for `app.log`) and a fresh file is
//! started. Backups are pruned by count and age, and optionally compressed,
//! on a background thread after every rotation.
//!
//! ```rust
//! use {
//!     nlog::{Compression, RollingFileBuilder, RotationSize},
//!     std::io::Write,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = tempfile::tempdir()?;
//!     let mut file = RollingFileBuilder::new(dir.path(), "app.log")
//!         .max_size(RotationSize::MB(10))
//!         .max_backups(3)
//!         .max_age_days(7)
//!         .compression(Compression::Gzip)
//!         .build()?;
//!     writeln!(file, "This is an info message")?;
//!     Ok(())
//! }
//! ```
use {
    crate::error::NLogError,
    chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Utc},
    flate2::write::GzEncoder,
    regex::Regex,
    std::{
        collections::HashSet,
        fs::{self, Permissions},
        io::{self, Write as _},
        path::{Path, PathBuf},
        thread::JoinHandle,
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Size used when the configured maximum is zero.
pub const DEFAULT_MAX_SIZE: RotationSize = RotationSize::MB(100);

/// chrono format of the timestamp embedded in backup file names.
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Defines size thresholds for rotating log files in various units.
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the size in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb * 1024,
            RotationSize::MB(mb) => mb * 1024 * 1024,
            RotationSize::GB(gb) => gb * 1024 * 1024 * 1024,
        }
    }
}

/// Compression applied to rotated backups.
///
/// A compressed backup keeps its name and gains the algorithm's extension
/// (`.gz` or `.xz`); the uncompressed copy is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip compression, a good balance of ratio and speed.
    Gzip,
    /// XZ (LZMA2) compression, higher ratio but slower.
    XZ,
}

impl Compression {
    /// Get the extension for the compressed log file.
    fn get_extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::XZ => "xz",
        }
    }
}

/// Time zone used for the timestamps in backup file names and for age based
/// pruning.
///
/// # Examples
/// ```
/// use nlog::TimeZone;
/// use chrono::FixedOffset;
///
/// let utc = TimeZone::UTC;
/// let local = TimeZone::Local;
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    /// UTC, the default.
    UTC,
    /// The system's local time zone at the time the writer is built.
    Local,
    /// A fixed offset.
    Fix(FixedOffset),
}

impl TimeZone {
    fn offset(self) -> FixedOffset {
        match self {
            TimeZone::UTC => Utc::now().fixed_offset().offset().to_owned(),
            TimeZone::Local => Local::now().offset().to_owned(),
            TimeZone::Fix(fixed_offset) => fixed_offset,
        }
    }
}

/// Immutable settings of a rolling file. Cloned into the maintenance thread.
#[derive(Debug, Clone)]
struct RollingFileMeta {
    /// The directory where the log files are stored.
    directory: PathBuf,
    /// The name of the active log file.
    filename: PathBuf,
    /// Maximum size of the active file in bytes.
    max_size: u64,
    /// Number of backups to keep, 0 keeps all.
    max_backups: usize,
    /// Days to keep backups, 0 keeps them forever.
    max_age_days: u64,
    /// Offset used for backup names and age computation.
    time_zone: FixedOffset,
    /// The compression type for backups.
    compression: Option<Compression>,
    /// Unix mode for created files; ignored with a warning elsewhere.
    file_mode: Option<u32>,
}

/// A rotated backup found on disk.
#[derive(Debug, Clone)]
struct Backup {
    path: PathBuf,
    time: NaiveDateTime,
    /// Tie breaker for backups rolled within the same millisecond.
    seq: u32,
    compressed: bool,
}

impl RollingFileMeta {
    fn new<D: AsRef<Path>, F: AsRef<Path>>(directory: D, filename: F) -> Self {
        RollingFileMeta {
            directory: directory.as_ref().to_path_buf(),
            filename: filename.as_ref().to_path_buf(),
            max_size: DEFAULT_MAX_SIZE.bytes(),
            max_backups: 0,
            max_age_days: 0,
            time_zone: TimeZone::UTC.offset(),
            compression: None,
            file_mode: None,
        }
    }

    /// Get the current time in the configured time zone.
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.time_zone)
    }

    /// Path of the active log file.
    fn curr_log_path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Split the file name into the part before the extension and the
    /// extension itself (with its dot). `app.log` gives `("app", ".log")`.
    fn name_parts(&self) -> (String, String) {
        let name = self.filename.to_string_lossy();
        match name.rfind('.') {
            Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx..].to_string()),
            _ => (name.into_owned(), String::new()),
        }
    }

    /// Get the backup path for a rotation happening at `datetime`. A `seq`
    /// above zero is appended to the timestamp as `-{seq}`.
    fn backup_path(&self, datetime: &DateTime<FixedOffset>, seq: u32) -> PathBuf {
        let (stem, ext) = self.name_parts();
        let time = datetime.format(BACKUP_TIME_FORMAT);
        match seq {
            0 => self.directory.join(format!("{stem}-{time}{ext}")),
            seq => self.directory.join(format!("{stem}-{time}-{seq}{ext}")),
        }
    }

    /// First backup path for `datetime` not taken by an existing backup,
    /// compressed or not.
    fn next_backup_path(&self, datetime: &DateTime<FixedOffset>) -> PathBuf {
        let mut seq = 0;
        loop {
            let path = self.backup_path(datetime, seq);
            let taken = path.exists()
                || [Compression::Gzip, Compression::XZ].iter().any(|compression| {
                    PathBuf::from(format!("{}.{}", path.to_string_lossy(), compression.get_extension())).exists()
                });
            if !taken {
                return path;
            }
            seq += 1;
        }
    }

    /// Create or open the log file for appending.
    /// If the directory does not exist, it is created first.
    /// # Arguments
    /// * `log_path` - The path to the log file.
    /// # Returns
    /// The log file.
    fn create_log_file(&self, log_path: &Path) -> Result<fs::File, NLogError> {
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);

        let mut create_log_file_res = open_options.open(log_path);
        if create_log_file_res.is_err() {
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| NLogError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
                create_log_file_res = open_options.open(log_path);
            }
        }

        let log_file =
            create_log_file_res.map_err(|err| NLogError::CreateFileFailed(log_path.to_path_buf(), err.to_string()))?;

        self.set_permissions(log_path)?;

        Ok(log_file)
    }

    /// Set the permissions for a file based on the configured file mode.
    ///
    /// # Platform-specific behavior
    /// * On Unix systems: Sets the file mode using the octal permissions (e.g.,
    ///   0o644 for rw-r--r--)
    /// * On non-Unix systems: Prints a warning message and does nothing
    fn set_permissions(&self, path: &Path) -> Result<(), NLogError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                let perms = Permissions::from_mode(mode);
                fs::set_permissions(path, perms).map_err(|err| NLogError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = mode;
                eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }

    /// List all backups of this log file, newest first.
    ///
    /// Both `.gz` and `.xz` backups are recognised regardless of the
    /// configured compression, so changing it does not orphan old files.
    fn list_backups(&self) -> Result<Vec<Backup>, NLogError> {
        let (stem, ext) = self.name_parts();
        let pattern = Regex::new(&format!(
            r"^{}-(\d{{4}}-\d{{2}}-\d{{2}}T\d{{2}}-\d{{2}}-\d{{2}}\.\d{{3}})(?:-(\d+))?{}(\.gz|\.xz)?$",
            regex::escape(&stem),
            regex::escape(&ext),
        ))
        .map_err(|err| NLogError::InternalError(err.to_string()))?;

        let files = fs::read_dir(&self.directory).map_err(NLogError::FileIOError)?;

        let mut backups = Vec::new();
        for file in files.flatten() {
            let metadata = file.metadata().map_err(NLogError::FileIOError)?;
            if !metadata.is_file() {
                continue;
            }
            let Some(file_name) = file.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(captures) = pattern.captures(&file_name) else {
                continue;
            };
            let Ok(time) = NaiveDateTime::parse_from_str(&captures[1], BACKUP_TIME_FORMAT) else {
                continue;
            };
            let Ok(seq) = captures.get(2).map_or(Ok(0), |seq| seq.as_str().parse()) else {
                continue;
            };
            backups.push(Backup {
                path: file.path(),
                time,
                seq,
                compressed: captures.get(3).is_some(),
            });
        }

        backups.sort_by(|a, b| {
            b.time
                .cmp(&a.time)
                .then_with(|| b.seq.cmp(&a.seq))
                .then_with(|| b.path.cmp(&a.path))
        });

        Ok(backups)
    }

    /// Apply the retention policy to existing backups, then compress the ones
    /// that survive.
    fn process_old_logs(&self) -> Result<(), NLogError> {
        let backups = self.list_backups()?;
        let mut remove = Vec::new();
        let mut keep = Vec::new();

        if self.max_backups > 0 {
            // A backup and its compressed copy count as one.
            let mut preserved = HashSet::new();
            for backup in backups {
                let key = (backup.time, backup.seq);
                if preserved.contains(&key) || preserved.len() < self.max_backups {
                    preserved.insert(key);
                    keep.push(backup);
                } else {
                    remove.push(backup);
                }
            }
        } else {
            keep = backups;
        }

        let cutoff = i64::try_from(self.max_age_days)
            .ok()
            .filter(|days| *days > 0)
            .and_then(Duration::try_days)
            .and_then(|max_age| self.now().naive_local().checked_sub_signed(max_age));
        if let Some(cutoff) = cutoff {
            let (expired, fresh): (Vec<_>, Vec<_>) = keep.into_iter().partition(|backup| backup.time < cutoff);
            remove.extend(expired);
            keep = fresh;
        }

        for backup in &remove {
            if let Err(err) = fs::remove_file(&backup.path) {
                if err.kind() != io::ErrorKind::NotFound {
                    eprintln!("Failed to remove old log file '{}': {}", backup.path.display(), err);
                }
            }
        }

        if self.compression.is_some() {
            for backup in keep.iter().filter(|backup| !backup.compressed) {
                self.compress(&backup.path)?;
            }
        }

        Ok(())
    }

    /// Compress a backup and remove the uncompressed file.
    fn compress(&self, log_path: &Path) -> Result<(), NLogError> {
        let Some(compression) = &self.compression else {
            return Ok(());
        };
        let infile = match fs::File::open(log_path) {
            Ok(infile) => infile,
            // Already handled by a previous pass.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(NLogError::FileIOError(err)),
        };
        let mut reader = io::BufReader::new(infile);

        let compressed_path = PathBuf::from(format!(
            "{}.{}",
            log_path.to_string_lossy(),
            compression.get_extension()
        ));
        let outfile = fs::File::create(&compressed_path).map_err(NLogError::FileIOError)?;
        let mut writer = io::BufWriter::new(outfile);

        match compression {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            Compression::XZ => {
                lzma_rs::xz_compress(&mut reader, &mut writer)?;
                writer.flush()?;
            }
        }
        self.set_permissions(&compressed_path)?;

        fs::remove_file(log_path).map_err(NLogError::FileIOError)?;
        Ok(())
    }
}

/// Mutable bookkeeping of a rolling file.
struct RollingFileState {
    /// Bytes in the active file.
    curr_file_size_bytes: u64,
    /// The last backup maintenance run, if any.
    maintenance: Option<JoinHandle<()>>,
    /// A rotation happened while a maintenance run was still going.
    maintenance_pending: bool,
}

/// A log file that rolls over once it reaches its maximum size.
///
/// Implements [`io::Write`]; share it between threads behind a `Mutex`.
pub struct RollingFile {
    meta: RollingFileMeta,
    state: RollingFileState,
    writer: fs::File,
}

impl RollingFile {
    pub fn builder<D: AsRef<Path>, F: AsRef<Path>>(directory: D, filename: F) -> RollingFileBuilder {
        RollingFileBuilder::new(directory, filename)
    }

    /// Path of the active log file.
    pub fn path(&self) -> PathBuf {
        self.meta.curr_log_path()
    }

    /// Bytes written to the active log file, including what it held when it
    /// was opened.
    pub fn current_size(&self) -> u64 {
        self.state.curr_file_size_bytes
    }

    /// Maximum size of the active log file in bytes.
    pub fn max_size(&self) -> u64 {
        self.meta.max_size
    }

    /// Close the active file, move it to a timestamped backup, and start a
    /// new one. Backup maintenance runs on a background thread afterwards.
    pub fn rotate(&mut self) -> Result<(), NLogError> {
        self.writer.flush()?;

        let curr_log_path = self.meta.curr_log_path();
        if curr_log_path.exists() {
            let backup_path = self.meta.next_backup_path(&self.meta.now());
            fs::rename(&curr_log_path, &backup_path).map_err(|err| NLogError::RenameFileError {
                from: curr_log_path.clone(),
                to: backup_path.clone(),
                error: err.to_string(),
            })?;
        }

        self.writer = self.meta.create_log_file(&curr_log_path)?;
        self.state.curr_file_size_bytes = 0;

        self.spawn_maintenance();
        Ok(())
    }

    /// Block until backup maintenance has finished, including a run that
    /// was deferred because another one was in progress.
    pub fn wait_for_maintenance(&mut self) {
        loop {
            self.join_maintenance();
            if !self.state.maintenance_pending {
                break;
            }
            self.spawn_maintenance();
        }
    }

    fn join_maintenance(&mut self) {
        if let Some(handle) = self.state.maintenance.take() {
            if handle.join().is_err() {
                eprintln!(
                    "Backup maintenance for '{}' panicked",
                    self.meta.curr_log_path().display()
                );
            }
        }
    }

    /// Start a maintenance run. Runs never overlap: while one is in progress
    /// the request is remembered and picked up by a later write instead of
    /// blocking the writer.
    fn spawn_maintenance(&mut self) {
        if self
            .state
            .maintenance
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            self.state.maintenance_pending = true;
            return;
        }
        self.join_maintenance();
        self.state.maintenance_pending = false;
        let meta = self.meta.clone();
        self.state.maintenance = Some(std::thread::spawn(move || {
            if let Err(err) = meta.process_old_logs() {
                eprintln!(
                    "Failed to process old log files for '{}': {}",
                    meta.curr_log_path().display(),
                    err
                );
            }
        }));
    }
}

impl io::Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if len > self.meta.max_size {
            return Err(NLogError::WriteTooLarge {
                len,
                max: self.meta.max_size,
            }
            .into());
        }

        if self.state.curr_file_size_bytes + len > self.meta.max_size {
            self.rotate()?;
        }

        let bytes = self.writer.write(buf)?;
        self.state.curr_file_size_bytes += bytes as u64;
        if self.state.maintenance_pending {
            self.spawn_maintenance();
        }
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Provides a fluent interface for configuring [`RollingFile`] instances.
///
/// # Default Configuration
///
/// * Rotate at 100 MB
/// * Keep all backups regardless of count and age
/// * UTC timestamps in backup names
/// * No compression
/// * Standard file permissions
pub struct RollingFileBuilder {
    meta: RollingFileMeta,
}

impl RollingFileBuilder {
    /// Create a new rolling file builder.
    /// # Arguments
    /// * `directory` - The directory where the log files are stored.
    /// * `filename` - The name of the log file.
    pub fn new<D: AsRef<Path>, F: AsRef<Path>>(directory: D, filename: F) -> Self {
        RollingFileBuilder {
            meta: RollingFileMeta::new(directory, filename),
        }
    }

    /// Set the size at which the file is rolled. A size of zero selects
    /// [`DEFAULT_MAX_SIZE`].
    pub fn max_size(self, max_size: RotationSize) -> Self {
        let bytes = match max_size.bytes() {
            0 => DEFAULT_MAX_SIZE.bytes(),
            bytes => bytes,
        };
        Self {
            meta: RollingFileMeta {
                max_size: bytes,
                ..self.meta
            },
        }
    }

    /// Set the number of backups to keep. Zero keeps all of them.
    pub fn max_backups(self, max_backups: usize) -> Self {
        Self {
            meta: RollingFileMeta {
                max_backups,
                ..self.meta
            },
        }
    }

    /// Set the number of days backups are kept. Zero keeps them forever.
    pub fn max_age_days(self, max_age_days: u64) -> Self {
        Self {
            meta: RollingFileMeta {
                max_age_days,
                ..self.meta
            },
        }
    }

    /// Set the time zone for backup names.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self {
            meta: RollingFileMeta {
                time_zone: time_zone.offset(),
                ..self.meta
            },
        }
    }

    /// Set the compression type for backups.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            meta: RollingFileMeta {
                compression: Some(compression),
                ..self.meta
            },
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// For example, 0o644 for rw-r--r-- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: RollingFileMeta {
                file_mode: Some(mode),
                ..self.meta
            },
        }
    }

    /// Open (or create) the active log file.
    pub fn build(self) -> Result<RollingFile, NLogError> {
        let curr_log_path = self.meta.curr_log_path();
        let writer = self.meta.create_log_file(&curr_log_path)?;
        let curr_file_size_bytes = writer.metadata().map_or(0, |m| m.len());
        Ok(RollingFile {
            meta: self.meta,
            state: RollingFileState {
                curr_file_size_bytes,
                maintenance: None,
                maintenance_pending: false,
            },
            writer,
        })
    }
}
