//! Matching spoken words against labelled groups of recordings.
//!
//! An ASR engine turns each [`Recording`] into a probabilistic
//! [`Transcript`] (candidate text -> probability). Transcripts are compared
//! with a named [`Similarity`] algorithm, and the [`Matcher`] scores a query
//! against every [`Group`] by mean similarity and returns the best group or
//! an explicit indecision.
//!
//! # Data flow
//!
//! ```text
//! audio -> Transcriber -> Transcript (cached per Recording)
//!       -> pairwise similarity -> mean per Group -> Verdict
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use speechmatch_audio::AudioBuffer;
//! use speechmatch_matching::{Group, MatchOptions, Recording};
//! use speechmatch_speech::FixedTranscriber;
//!
//! let asr = Arc::new(
//!     FixedTranscriber::new()
//!         .with("A1", [("three", 0.9)])
//!         .with("A2", [("three", 0.9)])
//!         .with("B1", [("ten", 0.8)]),
//! );
//! let rec = |id: &str| Arc::new(Recording::new(id, AudioBuffer::silent(id), asr.clone()));
//!
//! let groups = [
//!     Group::with_recordings("three", [rec("A1")]),
//!     Group::with_recordings("ten", [rec("B1")]),
//! ];
//! let result = rec("A2").match_groups(&groups, &MatchOptions::default()).unwrap();
//! assert_eq!(result.identifier(), Some("three"));
//! ```
//!
//! # Concurrency
//!
//! A recording's transcript is computed at most once, even when several
//! threads ask for it at the same time. Groups are plain values; share them
//! across threads behind your own lock.

pub mod algorithm;
mod directory;
mod error;
mod evaluate;
mod group;
mod matcher;
mod memo;
mod recording;
mod session;
mod transcript;

pub use algorithm::{
    registry, AlgorithmRegistry, Normalizer, Similarity, DEFAULT_NORMALIZER, DEFAULT_SIMILARITY,
};
pub use directory::load_directory_groups;
pub use error::{MatchError, SessionError};
pub use evaluate::{evaluate_leave_one_out, Evaluation, Outcome, Trial};
pub use group::Group;
pub use matcher::{GroupScore, MatchOptions, MatchResult, Matcher, Verdict};
pub use recording::{Recording, RecordingFactory};
pub use session::{Session, SessionState, Submission};
pub use transcript::Transcript;
