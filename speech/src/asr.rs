//! Automatic speech recognition interface.

use std::collections::BTreeMap;

use speechmatch_audio::{AudioBuffer, AudioError};

/// Candidate texts with their probabilities, as produced by an ASR engine.
///
/// Probabilities lie in [0, 1] but need not sum to 1: engines may score
/// hypotheses independently.
pub type Candidates = BTreeMap<String, f64>;

/// Error type for transcription.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranscriptionError {
    #[error("no transcription candidates for {0}")]
    Empty(String),
    #[error("candidate {text:?} has invalid probability {probability}")]
    InvalidProbability { text: String, probability: f64 },
    #[error("transcriber unavailable: {0}")]
    Unavailable(String),
    #[error("transcription failed: {0}")]
    Engine(String),
    #[error("invalid engine output: {0}")]
    InvalidOutput(String),
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
}

/// Interface for complete (non-streaming) speech recognition.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; a call may block on
/// network or CPU work.
pub trait Transcriber: Send + Sync {
    /// Transcribes the whole buffer into a non-empty set of candidates.
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Candidates, TranscriptionError>;
}

/// Checks that `candidates` is non-empty and every probability is a finite
/// number in [0, 1].
pub fn validate_candidates(source: &str, candidates: &Candidates) -> Result<(), TranscriptionError> {
    if candidates.is_empty() {
        return Err(TranscriptionError::Empty(source.to_string()));
    }
    for (text, &p) in candidates {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(TranscriptionError::InvalidProbability {
                text: text.clone(),
                probability: p,
            });
        }
    }
    Ok(())
}
