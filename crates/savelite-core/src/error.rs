//! Error types for SaveLite.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used as the underlying cause of (de)serialization problems.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for SaveLite operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A lock was poisoned (internal error)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// I/O error not covered by a more specific variant
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The target file or its directory does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path that was looked up
        path: PathBuf,
        /// Underlying cause, if the absence was reported by the OS
        #[source]
        source: Option<std::io::Error>,
    },

    /// The file exists but holds no content
    #[error("File is empty: {}", path.display())]
    EmptyFile {
        /// Path of the empty file
        path: PathBuf,
    },

    /// Stored content could not be turned back into a document or value
    #[error("Deserialization error ({context}): {source}")]
    Deserialization {
        /// What was being decoded
        context: String,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// The document or a value could not be rendered to its stored form
    #[error("Serialization error ({context}): {source}")]
    Serialization {
        /// What was being encoded
        context: String,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// A compression or encryption transform failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Copying the primary file into a backup slot failed
    #[error("Backup {index} failed: {source}")]
    BackupFailed {
        /// Backup slot that was being written
        index: usize,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Removing a backup file failed
    #[error("Failed to delete backup {index}: {source}")]
    BackupDeletionFailed {
        /// Backup slot that was being removed
        index: usize,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Removing the primary file failed
    #[error("Failed to delete primary file: {source}")]
    DeletionFailed {
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Backup index outside of `[0, count)`
    #[error("Invalid backup index {index} (backup count is {count})")]
    InvalidBackupIndex {
        /// Requested index
        index: usize,
        /// Live backup count at the time of the request
        count: usize,
    },

    /// A backup load was requested but no backup exists
    #[error("No backups available")]
    NoBackups,

    /// Every backup was tried and none could be loaded
    #[error("Could not load any backups after {attempts} attempts: {last}")]
    BackupsExhausted {
        /// Number of backup slots tried
        attempts: usize,
        /// Problem reported by the final attempt
        #[source]
        last: Box<Error>,
    },

    /// A copied file does not match its source
    #[error("Checksum mismatch for {}: expected {expected:#010x}, got {actual:#010x}", path.display())]
    ChecksumMismatch {
        /// Path of the copy
        path: PathBuf,
        /// CRC32 of the source
        expected: u32,
        /// CRC32 of the copy
        actual: u32,
    },

    /// Typed access attempted before any successful load
    #[error("No document has been loaded")]
    NotLoaded,

    /// The requested key is not present in the document
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Settings failed validation or could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background worker went away before reporting
    #[error("Background worker unavailable")]
    WorkerUnavailable,
}

/// Classification of errors, independent of their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Target file or its directory is absent
    FileAccess,
    /// File present but zero-length
    EmptyContent,
    /// Stored content malformed for its declared shape
    Deserialization,
    /// Document could not be rendered to storage form
    Serialization,
    /// Copy or delete of a backup file failed, or no backup could be used
    BackupOperation,
    /// Backup index out of the current range
    InvalidIndex,
    /// Removing the primary file failed
    Deletion,
    /// Typed access attempted before any successful load
    NotLoaded,
    /// Typed access to a key that does not exist
    KeyNotFound,
    /// Invalid settings
    Configuration,
    /// Locking, I/O plumbing and worker failures
    Internal,
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileNotFound { .. } => ErrorKind::FileAccess,
            Error::EmptyFile { .. } => ErrorKind::EmptyContent,
            Error::Deserialization { .. } => ErrorKind::Deserialization,
            Error::Serialization { .. } => ErrorKind::Serialization,
            Error::BackupFailed { .. }
            | Error::BackupDeletionFailed { .. }
            | Error::NoBackups
            | Error::BackupsExhausted { .. }
            | Error::ChecksumMismatch { .. } => ErrorKind::BackupOperation,
            Error::InvalidBackupIndex { .. } => ErrorKind::InvalidIndex,
            Error::DeletionFailed { .. } => ErrorKind::Deletion,
            Error::NotLoaded => ErrorKind::NotLoaded,
            Error::KeyNotFound(_) => ErrorKind::KeyNotFound,
            Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::LockPoisoned | Error::Io(_) | Error::Codec(_) | Error::WorkerUnavailable => {
                ErrorKind::Internal
            }
        }
    }

    /// Maps an I/O error on `path` to [`Error::FileNotFound`] when the OS
    /// reports absence, and to [`Error::Io`] otherwise.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.into(),
                source: Some(err),
            }
        } else {
            Error::Io(err)
        }
    }

    /// Wraps any error as a deserialization problem.
    pub fn deserialization(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Deserialization {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wraps any error as a serialization problem.
    pub fn serialization(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Serialization {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True when the error means the file or its directory is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound { .. })
    }
}

/// A specialized `Result` type for SaveLite operations.
pub type Result<T> = std::result::Result<T, Error>;
