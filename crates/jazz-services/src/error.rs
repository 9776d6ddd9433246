//! Sample and WAV errors

use std::path::PathBuf;

use thiserror::Error;

/// Load/save failures. The numeric [`SampleError::code`] follows the
/// sequencer's status codes: 1 = stat/open failure, 2 = format mismatch,
/// 3 = unsupported format.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Sample has no file name")]
    NoFileName,
    #[error("WAV write error: {0}")]
    Write(#[from] hound::Error),
    #[error("Not a PCM RIFF/WAVE file: {0}")]
    Format(String),
    #[error("Unsupported sample format: {0}")]
    Unsupported(String),
}

impl SampleError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Io { .. } | Self::NoFileName | Self::Write(_) => 1,
            Self::Format(_) => 2,
            Self::Unsupported(_) => 3,
        }
    }
}
