//! Error type shared by every archive operation.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PfsError>;

#[derive(Error, Debug)]
pub enum PfsError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("IO error: {0}")]
    File(#[from] io::Error),
    #[error("Misuse: {0}")]
    Misuse(&'static str),
    #[error("Corrupted archive: {0}")]
    Corrupted(String),
    #[error("Index {index} out of bounds (file count {count})")]
    OutOfBounds { index: usize, count: usize },
}

/// Payload-free discriminant of [`PfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    OutOfMemory,
    Compression,
    File,
    Misuse,
    Corrupted,
    OutOfBounds,
}

impl PfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PfsError::NotFound(_)        => ErrorKind::NotFound,
            PfsError::OutOfMemory        => ErrorKind::OutOfMemory,
            PfsError::Compression(_)     => ErrorKind::Compression,
            PfsError::File(_)            => ErrorKind::File,
            PfsError::Misuse(_)          => ErrorKind::Misuse,
            PfsError::Corrupted(_)       => ErrorKind::Corrupted,
            PfsError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
        }
    }

    /// Numeric status code used by C consumers of the format.
    pub fn code(&self) -> i32 {
        match self.kind() {
            ErrorKind::NotFound    => -1,
            ErrorKind::OutOfMemory => -2,
            ErrorKind::Compression => -3,
            ErrorKind::File        => -4,
            ErrorKind::Misuse      => -5,
            ErrorKind::Corrupted   => -6,
            ErrorKind::OutOfBounds => -7,
        }
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        PfsError::Corrupted(msg.into())
    }
}

impl From<std::collections::TryReserveError> for PfsError {
    fn from(_: std::collections::TryReserveError) -> Self {
        PfsError::OutOfMemory
    }
}
