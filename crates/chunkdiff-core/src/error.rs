use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type ChunkdiffResult<T> = Result<T, ChunkdiffError>;

#[derive(Debug, Error)]
pub enum ChunkdiffError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("malformed payload at index {index}: {reason}")]
    MalformedPayload { index: usize, reason: String },

    #[error("unknown operation type {tag:?} at index {index}")]
    UnknownOperation { index: usize, tag: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable, machine-readable error kind reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    EmptyInput,
    MalformedPayload,
    UnknownOperation,
    InvariantViolation,
    Config,
    Io,
    Other,
}

impl ChunkdiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Map an I/O failure on `path` onto the request-level taxonomy.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            index,
            reason: reason.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
