use std::fmt;
use std::time::Duration;

use crate::{resample, AudioError};

/// Describes the layout of the samples held by an [`AudioBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// True for interleaved stereo, false for mono.
    pub stereo: bool,
}

impl Format {
    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self { sample_rate, stereo: false }
    }

    /// Creates a stereo format with the given sample rate.
    pub const fn stereo(sample_rate: u32) -> Self {
        Self { sample_rate, stereo: true }
    }

    /// Returns the number of channels (1 for mono, 2 for stereo).
    pub fn channels(&self) -> usize {
        if self.stereo { 2 } else { 1 }
    }
}

impl Format {
    /// 16kHz mono, the input format of the acoustic model.
    pub const MONO_16K: Format = Format::mono(16000);
    /// 44.1kHz stereo (CD quality).
    pub const STEREO_44K: Format = Format::stereo(44100);
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = if self.stereo { "stereo" } else { "mono" };
        write!(f, "{}Hz {}", self.sample_rate, layout)
    }
}

/// Decoded audio: interleaved f32 samples in [-1, 1] plus the name of the
/// source they were read from.
#[derive(Clone)]
pub struct AudioBuffer {
    source: String,
    format: Format,
    samples: Vec<f32>,
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("source", &self.source)
            .field("format", &self.format)
            .field("samples_len", &self.samples.len())
            .finish()
    }
}

impl AudioBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(source: impl Into<String>, format: Format, samples: Vec<f32>) -> Self {
        Self {
            source: source.into(),
            format,
            samples,
        }
    }

    /// Creates a buffer with no samples, labelled with `source`.
    ///
    /// Useful for transcribers that only look at the source name.
    pub fn silent(source: impl Into<String>) -> Self {
        Self::new(source, Format::MONO_16K, Vec::new())
    }

    /// Returns the name (usually a path) the audio was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.format.sample_rate as f64)
    }

    /// Down-mixes to mono by averaging the channels of each frame.
    pub fn to_mono(&self) -> AudioBuffer {
        if !self.format.stereo {
            return self.clone();
        }
        let samples = self
            .samples
            .chunks(2)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        AudioBuffer::new(
            self.source.clone(),
            Format::mono(self.format.sample_rate),
            samples,
        )
    }

    /// Converts the buffer to `target`, down-mixing or duplicating channels
    /// and resampling as needed.
    pub fn to_format(&self, target: Format) -> Result<AudioBuffer, AudioError> {
        if self.format == target {
            return Ok(self.clone());
        }

        let mono = self.to_mono();
        let resampled = if mono.format.sample_rate != target.sample_rate {
            resample(&mono, target.sample_rate)?
        } else {
            mono
        };

        if !target.stereo {
            return Ok(resampled);
        }
        let samples = resampled.samples.iter().flat_map(|&s| [s, s]).collect();
        Ok(AudioBuffer::new(resampled.source, target, samples))
    }
}
