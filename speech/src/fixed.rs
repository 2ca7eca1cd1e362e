use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use speechmatch_audio::AudioBuffer;

use crate::{validate_candidates, Candidates, Transcriber, TranscriptionError};

/// A deterministic transcriber that answers from a fixed table keyed by
/// [`AudioBuffer::source`].
///
/// Sources missing from the table fail with [`TranscriptionError::Empty`],
/// exactly like an engine that heard nothing. Every call is counted, and an
/// optional latency makes concurrent callers overlap.
#[derive(Default)]
pub struct FixedTranscriber {
    table: HashMap<String, Candidates>,
    latency: Duration,
    calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the candidates returned for `source`.
    pub fn with<I, S>(mut self, source: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.insert(source, candidates);
        self
    }

    /// Sleeps for `latency` inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Adds or replaces the candidates returned for `source`.
    pub fn insert<I, S>(&mut self, source: impl Into<String>, candidates: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let candidates = candidates.into_iter().map(|(t, p)| (t.into(), p)).collect();
        self.table.insert(source.into(), candidates);
    }

    /// Returns how many times [`Transcriber::transcribe`] was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for FixedTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Candidates, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let candidates = self
            .table
            .get(audio.source())
            .cloned()
            .unwrap_or_default();
        validate_candidates(audio.source(), &candidates)?;
        Ok(candidates)
    }
}
