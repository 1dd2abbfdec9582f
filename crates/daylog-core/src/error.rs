//! Error types for Daylog

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Daylog operations
#[derive(Error, Debug)]
pub enum LogError {
    /// The log directory could not be created
    #[error("Cannot create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A log file could not be opened for append
    #[error("Cannot open log file {}: {source}", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A write or flush was attempted on a closed writer
    #[error("Writer for {} is closed", .path.display())]
    WriterClosed { path: PathBuf },

    /// The background writer thread could not be started or died
    #[error("Writer thread for {} failed", .path.display())]
    WriterThread { path: PathBuf },

    /// Delimiter would make encoded rows ambiguous
    #[error("Invalid delimiter: {0:?}")]
    InvalidDelimiter(char),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using LogError
pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogError::WriterClosed {
            path: PathBuf::from("logs/2024-03-01.csv"),
        };
        assert_eq!(format!("{}", err), "Writer for logs/2024-03-01.csv is closed");

        let err = LogError::InvalidDelimiter('"');
        assert_eq!(format!("{}", err), "Invalid delimiter: '\"'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let log_err: LogError = io_err.into();
        assert!(matches!(log_err, LogError::Io(_)));
    }
}
