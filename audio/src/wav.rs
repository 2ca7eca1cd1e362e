//! WAV file loading and writing.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::{AudioBuffer, AudioError, Format};

/// Turns an audio file into an [`AudioBuffer`].
///
/// Container and codec details stay behind this trait; callers only see
/// decoded samples or an [`AudioError`].
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait AudioLoader: Send + Sync {
    /// Loads and decodes the file at `path`.
    fn load(&self, path: &Path) -> Result<AudioBuffer, AudioError>;

    /// Returns true if the loader recognizes the file type of `path`.
    fn supports(&self, path: &Path) -> bool;
}

/// Loads PCM or float WAV files with hound.
///
/// Mono and stereo files keep their layout; files with more channels are
/// down-mixed to mono while loading.
#[derive(Debug, Clone, Default)]
pub struct WavLoader;

impl WavLoader {
    pub fn new() -> Self {
        Self
    }
}

impl AudioLoader for WavLoader {
    fn load(&self, path: &Path) -> Result<AudioBuffer, AudioError> {
        let reader = WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) => AudioError::Open {
                path: path.to_path_buf(),
                reason: io.to_string(),
            },
            other => AudioError::Decode {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(AudioError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("{} channels at {}Hz", spec.channels, spec.sample_rate),
            });
        }

        let decode_err = |e: hound::Error| AudioError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?,
            SampleFormat::Int => {
                let max_val = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(decode_err)?
            }
        };

        let source = path.to_string_lossy().into_owned();
        if samples.is_empty() {
            return Err(AudioError::Empty(source));
        }

        let channels = spec.channels as usize;
        let buffer = match channels {
            1 => AudioBuffer::new(source, Format::mono(spec.sample_rate), samples),
            2 => AudioBuffer::new(source, Format::stereo(spec.sample_rate), samples),
            _ => {
                let mixed = samples
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                    .collect();
                AudioBuffer::new(source, Format::mono(spec.sample_rate), mixed)
            }
        };

        debug!(
            source = buffer.source(),
            format = %buffer.format(),
            duration_ms = buffer.duration().as_millis() as u64,
            "loaded wav"
        );
        Ok(buffer)
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"))
            .unwrap_or(false)
    }
}

/// Writes a buffer as 16-bit signed PCM WAV, clamping samples to [-1, 1].
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let write_err = |e: hound::Error| AudioError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let format = buffer.format();
    let spec = WavSpec {
        channels: format.channels() as u16,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(write_err)?;
    for &s in buffer.samples() {
        let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(v).map_err(write_err)?;
    }
    writer.finalize().map_err(write_err)
}
