//! Speech recognition capability for speech matching.
//!
//! This crate provides:
//! - [`Transcriber`]: the interface every ASR engine implements, returning
//!   [`Candidates`] (candidate text -> probability)
//! - [`FixedTranscriber`]: a deterministic engine for tests and fixtures
//! - [`SidecarTranscriber`]: candidates stored next to the audio as JSON
//! - [`AcousticTranscriber`]: drives an external CTC acoustic-model binary
//! - [`ctc`]: parsing of per-timestep emissions and prefix beam search
//!
//! # Example
//!
//! ```rust
//! use speechmatch_audio::AudioBuffer;
//! use speechmatch_speech::{FixedTranscriber, Transcriber};
//!
//! let asr = FixedTranscriber::new().with("A1", [("three", 0.9)]);
//! let candidates = asr.transcribe(&AudioBuffer::silent("A1")).unwrap();
//! assert_eq!(candidates["three"], 0.9);
//! ```

mod acoustic;
mod asr;
pub mod ctc;
mod fixed;
mod sidecar;

pub use acoustic::{AcousticConfig, AcousticTranscriber};
pub use asr::{validate_candidates, Candidates, Transcriber, TranscriptionError};
pub use ctc::{CtcConfig, CtcDecoder, Emissions};
pub use fixed::FixedTranscriber;
pub use sidecar::SidecarTranscriber;
