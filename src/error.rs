//! Error types for the snapshot filesystem.

use crate::types::ObjectId;
use thiserror::Error;

/// Object store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Object {id} is a {actual}, expected a {expected}")]
    UnexpectedKind {
        id: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: ObjectId, actual: ObjectId },

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Filesystem instance errors
#[derive(Debug, Error)]
pub enum FsError {
    #[error("No such file: {0}")]
    NoSuchFile(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("File system is closed")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Merge command errors
///
/// A conflicting merge is not an error; it completes with a conflicting status.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No merge source was given")]
    MissingSource,

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("No common ancestor between {ours} and {theirs}")]
    MergeBaseNotFound { ours: String, theirs: String },

    #[error("File system has uncommitted changes")]
    UncommittedChanges,

    #[error("File system error: {0}")]
    Fs(#[from] FsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration and logging setup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
