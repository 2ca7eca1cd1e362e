//! Adapter for an external CTC acoustic-model binary.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use speechmatch_audio::{write_wav, AudioBuffer, Format};
use tracing::{debug, warn};

use crate::ctc::{CtcConfig, CtcDecoder, Emissions};
use crate::{validate_candidates, Candidates, Transcriber, TranscriptionError};

/// Configuration for [`AcousticTranscriber`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcousticConfig {
    /// Path to the acoustic binary.
    pub binary: PathBuf,
    /// Path to the serialized acoustic model passed as `-am`.
    pub model: PathBuf,
    /// Path to the token inventory passed as `-t`.
    pub tokens: PathBuf,
    /// Beam search settings.
    #[serde(default)]
    pub decoder: CtcConfig,
}

/// Runs the acoustic binary on each buffer and decodes its emissions.
///
/// The binary is invoked as
/// `binary -i <wav> -am <model> -t <tokens> -o <out>` and must write the
/// emission format described in [`crate::ctc`] to `<out>`. Audio is
/// down-mixed and resampled to 16kHz mono before it is handed over.
pub struct AcousticTranscriber {
    config: AcousticConfig,
    decoder: CtcDecoder,
}

impl AcousticTranscriber {
    pub fn new(config: AcousticConfig) -> Self {
        let decoder = CtcDecoder::new(config.decoder.clone());
        Self { config, decoder }
    }

    pub fn config(&self) -> &AcousticConfig {
        &self.config
    }

    fn run(&self, audio: &AudioBuffer) -> Result<Emissions, TranscriptionError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| TranscriptionError::Engine(format!("create temp dir: {e}")))?;
        let input = workdir.path().join("input.wav");
        let output = workdir.path().join("emissions.txt");

        let pcm = audio.to_format(Format::MONO_16K)?;
        write_wav(&input, &pcm)?;

        debug!(
            source = audio.source(),
            binary = %self.config.binary.display(),
            "running acoustic model"
        );
        let result = Command::new(&self.config.binary)
            .arg("-i")
            .arg(&input)
            .arg("-am")
            .arg(&self.config.model)
            .arg("-t")
            .arg(&self.config.tokens)
            .arg("-o")
            .arg(&output)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => TranscriptionError::Unavailable(format!(
                    "acoustic binary not found: {}",
                    self.config.binary.display()
                )),
                _ => TranscriptionError::Unavailable(format!(
                    "spawn {}: {e}",
                    self.config.binary.display()
                )),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stdout = String::from_utf8_lossy(&result.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            warn!(source = audio.source(), status = %result.status, "acoustic model failed");
            return Err(TranscriptionError::Engine(format!(
                "{} exited with {}: {}",
                self.config.binary.display(),
                result.status,
                detail.trim()
            )));
        }

        let text = std::fs::read_to_string(&output).map_err(|e| {
            TranscriptionError::Engine(format!("read {}: {e}", output.display()))
        })?;
        Emissions::parse(&text)
    }
}

impl Transcriber for AcousticTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Candidates, TranscriptionError> {
        let emissions = self.run(audio)?;
        let candidates = self.decoder.decode(&emissions);
        validate_candidates(audio.source(), &candidates)?;
        debug!(
            source = audio.source(),
            frames = emissions.len(),
            candidates = candidates.len(),
            best = %self.decoder.best_path(&emissions),
            "decoded emissions"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> AudioBuffer {
        AudioBuffer::new("tone", Format::MONO_16K, vec![0.1; 1600])
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let asr = AcousticTranscriber::new(AcousticConfig {
            binary: PathBuf::from("/nonexistent/acoustic"),
            ..Default::default()
        });
        let err = asr.transcribe(&tone()).unwrap_err();
        assert!(matches!(err, TranscriptionError::Unavailable(_)), "got {err:?}");
    }

    #[cfg(unix)]
    fn fake_binary(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("acoustic");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn decodes_binary_output() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_binary(
            dir.path(),
            r#"while [ $# -gt 0 ]; do
  case "$1" in -o) out="$2"; shift;; esac
  shift
done
printf 't e n #\n0.9 0 0 0.1\n0 0.9 0 0.1\n0 0 0.9 0.1\n' > "$out""#,
        );
        let asr = AcousticTranscriber::new(AcousticConfig {
            binary,
            ..Default::default()
        });

        let c = asr.transcribe(&tone()).unwrap();
        let (best, _) = c
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(best, "ten");
    }

    #[cfg(unix)]
    #[test]
    fn failing_binary_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_binary(dir.path(), "echo 'model load failed' >&2\nexit 3");
        let asr = AcousticTranscriber::new(AcousticConfig {
            binary,
            ..Default::default()
        });

        let err = asr.transcribe(&tone()).unwrap_err();
        match err {
            TranscriptionError::Engine(msg) => assert!(msg.contains("model load failed"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
