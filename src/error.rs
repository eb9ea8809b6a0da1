//! Error types for rowcount-scanner
//!
//! One enum per layer:
//! - `ResolveError`: turning a location string into server, identity and path
//! - `FsError`: the remote filesystem client
//! - `ContentError`: decoding a file to count its records
//! - `FileError`: a single matched file that could not be counted
//! - `ScanError`: everything that aborts a scan
//!
//! Only `FileError` is recoverable. The engine logs it, counts it and moves
//! on; every other error stops the operation before an aggregate is produced.

use thiserror::Error;

/// Failures while resolving a location string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither the location nor the environment names a server
    #[error("No server address for '{location}': use <scheme>://<host>:<port>/<path> or set a default server")]
    Configuration { location: String },

    /// The location string could not be parsed
    #[error("Invalid location '{location}': {reason}")]
    Parse { location: String, reason: String },
}

/// Remote filesystem client errors
#[derive(Error, Debug)]
pub enum FsError {
    /// Path does not exist
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Stat or open failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Enumerating a directory failed
    #[error("Failed to list '{path}': {reason}")]
    List { path: String, reason: String },
}

impl FsError {
    /// Map an `io::Error` for `path`, keeping `NotFound` distinct
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound { path }
        } else {
            FsError::Io { path, source }
        }
    }

    /// Check if the path was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Content scanner errors
#[derive(Error, Debug)]
pub enum ContentError {
    /// Reading the stream failed
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stream ended in the middle of a structure
    #[error("Unexpected end of data while reading {what}")]
    Truncated { what: &'static str },

    /// Stream does not start with the expected header
    #[error("Not a {format} file: bad magic bytes")]
    BadMagic { format: &'static str },

    /// Structure is present but inconsistent
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Parquet footer could not be decoded
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// A matched file that could not be counted
#[derive(Error, Debug)]
pub enum FileError {
    /// The file could not be opened
    #[error("Unable to open file: {0}")]
    Open(#[source] FsError),

    /// The content scanner rejected the file
    #[error("Unable to read file '{path}': {source}")]
    Content {
        path: String,
        #[source]
        source: ContentError,
    },
}

/// Errors that abort a scan
#[derive(Error, Debug)]
pub enum ScanError {
    /// The glob pattern is malformed
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The scan root could not be stat'ed
    #[error("Cannot stat scan root '{path}': {source}")]
    RootStat {
        path: String,
        #[source]
        source: FsError,
    },

    /// The scan root is neither a regular file nor a directory
    #[error("Input must be a file or directory: '{path}'")]
    UnsupportedRoot { path: String },

    /// The scan root is a regular file and could not be counted
    #[error("Cannot scan root file: {0}")]
    File(#[from] FileError),

    /// Listing a directory failed during the walk
    #[error("Directory listing failed: {0}")]
    DirectoryList(#[source] FsError),

    /// A worker thread could not be started
    #[error("Failed to start worker {id}: {source}")]
    WorkerSpawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked
    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },
}

/// Result type alias for ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for FsError
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Result type alias for ContentError
pub type ContentResult<T> = std::result::Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_from_io_keeps_not_found() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(FsError::from_io("/missing", missing).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = FsError::from_io("/locked", denied);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("/locked"));
    }

    #[test]
    fn test_file_error_conversion() {
        let file_err = FileError::Open(FsError::NotFound {
            path: "/data/a.avro".into(),
        });
        let scan_err: ScanError = file_err.into();
        assert!(matches!(scan_err, ScanError::File(_)));
    }

    #[test]
    fn test_resolve_error_messages() {
        let err = ResolveError::Configuration {
            location: "/data".into(),
        };
        assert!(err.to_string().contains("/data"));
    }
}
