//! Audio loading utilities.
//!
//! This crate provides the audio side of speech matching:
//!
//! - [`AudioBuffer`]: decoded samples plus the source they came from
//! - [`AudioLoader`] and [`WavLoader`]: turning a file into an [`AudioBuffer`]
//! - [`write_wav`]: writing a buffer back to a 16-bit PCM WAV file
//! - [`resample`]: sample rate conversion backed by rubato
//!
//! # Example
//!
//! ```rust,ignore
//! use speechmatch_audio::{AudioLoader, WavLoader, Format};
//!
//! let buffer = WavLoader::new().load("recordings/three/0001.wav".as_ref())?;
//! let buffer = buffer.to_format(Format::MONO_16K)?;
//! println!("{} ({:?})", buffer.source(), buffer.duration());
//! ```

mod buffer;
mod error;
mod resample;
mod wav;

pub use buffer::{AudioBuffer, Format};
pub use error::AudioError;
pub use resample::resample;
pub use wav::{write_wav, AudioLoader, WavLoader};
