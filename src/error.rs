use std::path::PathBuf;

/// Errors that can occur while setting up logging or writing rolled log files.
#[derive(Debug, thiserror::Error)]
pub enum NLogError {
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Write length {len} exceeds maximum file size {max}")]
    WriteTooLarge { len: u64, max: u64 },
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("File IO error: {0}")]
    FileIOError(#[from] std::io::Error),
    #[error("Failed to install global logger: {0}")]
    SetGlobalDefault(#[from] tracing::dispatcher::SetGlobalDefaultError),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<NLogError> for std::io::Error {
    fn from(err: NLogError) -> Self {
        match err {
            NLogError::FileIOError(err) => err,
            other => std::io::Error::other(other.to_string()),
        }
    }
}
