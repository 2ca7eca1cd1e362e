use std::io;
use std::path::PathBuf;

use speechmatch_audio::AudioBuffer;
use tracing::debug;

use crate::{validate_candidates, Candidates, Transcriber, TranscriptionError};

/// Reads candidates from a JSON file stored next to the audio.
///
/// For audio loaded from `dir/rec.wav` the candidates are read from
/// `dir/rec.wav.json`, a flat object of text to probability:
///
/// ```json
/// {"three": 0.91, "tree": 0.32}
/// ```
#[derive(Debug, Clone)]
pub struct SidecarTranscriber {
    extension: String,
}

impl Default for SidecarTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl SidecarTranscriber {
    pub fn new() -> Self {
        Self::with_extension("json")
    }

    /// Uses `<source>.<extension>` as the sidecar path.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Returns the sidecar path for an audio source.
    pub fn sidecar_path(&self, source: &str) -> PathBuf {
        PathBuf::from(format!("{source}.{}", self.extension))
    }
}

impl Transcriber for SidecarTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Candidates, TranscriptionError> {
        let path = self.sidecar_path(audio.source());
        let data = std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                TranscriptionError::Unavailable(format!("no sidecar transcript at {}", path.display()))
            }
            _ => TranscriptionError::Engine(format!("read {}: {e}", path.display())),
        })?;

        let candidates: Candidates = serde_json::from_slice(&data)
            .map_err(|e| TranscriptionError::InvalidOutput(format!("{}: {e}", path.display())))?;
        validate_candidates(audio.source(), &candidates)?;

        debug!(source = audio.source(), candidates = candidates.len(), "read sidecar transcript");
        Ok(candidates)
    }
}
