//! Error types for jazz-core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JazzError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(&'static str),
    #[error("Invalid {expected}: {found:?}")]
    Parse { expected: &'static str, found: String },
    #[error("Unsupported rhythm version: {0}")]
    UnsupportedVersion(i32),
    #[error("Invalid rhythm mode: {0}")]
    InvalidMode(i32),
}

pub type Result<T> = std::result::Result<T, JazzError>;
