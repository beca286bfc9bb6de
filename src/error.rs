use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of the token accounting subsystem.
///
/// Cache load/validity failures never surface to the user; they only force a
/// refresh. Extraction failures surface as "statistics omitted", never as a
/// process abort.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid cache format")]
    InvalidFormat,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("numeric value out of range")]
    InvalidConversion,

    #[error("arithmetic overflow")]
    Overflow,
}

impl StatusError {
    pub fn lock_timeout() -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out waiting for cache file lock",
        ))
    }
}

pub type Result<T> = std::result::Result<T, StatusError>;
