use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while loading or converting audio.
///
/// Every variant carries plain strings so the error can be cloned and
/// handed to several waiters.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("unsupported audio {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("audio {0} contains no samples")]
    Empty(String),

    #[error("resample: {0}")]
    Resample(String),

    #[error("write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resample(e.to_string())
    }
}
