use speechmatch_audio::AudioError;
use speechmatch_speech::TranscriptionError;
use thiserror::Error;

/// Errors returned by matching operations.
///
/// Indecision is not an error; see [`crate::Verdict::Indecision`].
#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("audio load error: {0}")]
    AudioLoad(#[from] AudioError),

    #[error("transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("recording {recording} is not a member of group {group}")]
    NotFound { group: String, recording: String },

    #[error("cannot sample {requested} recordings from group {group} of size {available}")]
    InsufficientSize {
        group: String,
        requested: usize,
        available: usize,
    },
}

/// Misuse of the interactive [`crate::Session`] protocol.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("not ready: {0}")]
    NotReady(&'static str),

    #[error("already interpreting")]
    AlreadyInterpreting,

    #[error("need at least two words, only {got} given")]
    NotEnoughWords { got: usize },

    #[error(transparent)]
    Match(#[from] MatchError),
}
