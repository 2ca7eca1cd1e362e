use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use speechmatch_audio::{AudioBuffer, AudioLoader};
use speechmatch_speech::Transcriber;
use tracing::{debug, warn};

use crate::algorithm::{registry, Normalizer, PlainNormalizer};
use crate::memo::Memo;
use crate::{Group, MatchError, MatchOptions, MatchResult, Matcher, Transcript};

/// A named audio source with a lazily computed transcript.
///
/// The transcript is produced by the injected [`Transcriber`] the first time
/// it is requested and cached for the lifetime of the recording. Concurrent
/// first requests wait on the one in-flight transcription. A failed
/// transcription is cached as well; the engine is never retried.
///
/// Recordings are shared as `Arc<Recording>`: a [`Group`] holds references
/// and compares members by pointer identity.
pub struct Recording {
    identifier: String,
    audio: Arc<AudioBuffer>,
    transcriber: Arc<dyn Transcriber>,
    normalizer: Arc<dyn Normalizer>,
    transcript: Memo<Arc<Transcript>, MatchError>,
}

impl Recording {
    /// Creates a recording whose transcript texts use the registry's
    /// default normalizer.
    pub fn new(identifier: impl Into<String>, audio: AudioBuffer, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            identifier: identifier.into(),
            audio: Arc::new(audio),
            transcriber,
            normalizer: default_normalizer(),
            transcript: Memo::new(),
        }
    }

    /// Uses `normalizer` for the transcript texts.
    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn audio(&self) -> &AudioBuffer {
        &self.audio
    }

    /// Returns the transcript, transcribing on first access.
    pub fn transcript(&self) -> Result<Arc<Transcript>, MatchError> {
        self.transcript.get_or_try_init(|| {
            let start = Instant::now();
            debug!(recording = %self.identifier, "transcribing");

            let result = self
                .transcriber
                .transcribe(&self.audio)
                .map_err(MatchError::from)
                .and_then(|c| Transcript::for_source(&self.identifier, c, self.normalizer.as_ref()));

            match &result {
                Ok(t) => debug!(
                    recording = %self.identifier,
                    text = t.text(),
                    candidates = t.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "transcribed"
                ),
                Err(e) => warn!(recording = %self.identifier, error = %e, "transcription failed"),
            }
            result.map(Arc::new)
        })
    }

    /// Reports whether a transcript has been successfully cached.
    pub fn is_transcribed(&self) -> bool {
        matches!(self.transcript.peek(), Some(Ok(_)))
    }

    /// Similarity of the two transcripts under the default algorithm.
    /// Transcribes either side if needed.
    pub fn similarity(&self, other: &Recording) -> Result<f64, MatchError> {
        let algorithm = registry().read().resolve_similarity(None)?;
        self.transcript()?.similarity_using(&*other.transcript()?, algorithm.as_ref())
    }

    /// Similarity of the two transcripts under a named algorithm.
    pub fn similarity_with(&self, other: &Recording, algorithm: &str) -> Result<f64, MatchError> {
        let algorithm = registry().read().similarity(algorithm)?;
        self.transcript()?.similarity_using(&*other.transcript()?, algorithm.as_ref())
    }

    /// Matches this recording against `groups`.
    pub fn match_groups(&self, groups: &[Group], options: &MatchOptions) -> Result<MatchResult, MatchError> {
        Matcher::new().match_recording(self, groups, options)
    }
}

impl fmt::Debug for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("identifier", &self.identifier)
            .field("audio", &self.audio)
            .field("normalizer", &self.normalizer.name())
            .field("transcribed", &self.is_transcribed())
            .finish()
    }
}

impl fmt::Display for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Resolves the registry's default normalizer, falling back to `plain`.
fn default_normalizer() -> Arc<dyn Normalizer> {
    registry()
        .read()
        .resolve_normalizer(None)
        .unwrap_or_else(|_| Arc::new(PlainNormalizer))
}

/// Builds recordings that share one loader, transcriber and normalizer.
#[derive(Clone)]
pub struct RecordingFactory {
    loader: Arc<dyn AudioLoader>,
    transcriber: Arc<dyn Transcriber>,
    normalizer: Arc<dyn Normalizer>,
}

impl RecordingFactory {
    /// Creates a factory using the registry's default normalizer.
    pub fn new(loader: Arc<dyn AudioLoader>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            loader,
            transcriber,
            normalizer: default_normalizer(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Uses the named normalizer from the process-wide registry.
    pub fn with_normalizer_name(self, name: &str) -> Result<Self, MatchError> {
        let normalizer = registry().read().normalizer(name)?;
        Ok(self.with_normalizer(normalizer))
    }

    pub fn transcriber(&self) -> &Arc<dyn Transcriber> {
        &self.transcriber
    }

    /// Reports whether the loader handles this file.
    pub fn supports(&self, path: &Path) -> bool {
        self.loader.supports(path)
    }

    /// Loads `path` into a recording identified by the path.
    pub fn open(&self, path: &Path) -> Result<Arc<Recording>, MatchError> {
        let audio = self.loader.load(path)?;
        let identifier = audio.source().to_string();
        Ok(self.from_buffer(identifier, audio))
    }

    /// Wraps an already decoded buffer.
    pub fn from_buffer(&self, identifier: impl Into<String>, audio: AudioBuffer) -> Arc<Recording> {
        Arc::new(
            Recording::new(identifier, audio, Arc::clone(&self.transcriber))
                .with_normalizer(Arc::clone(&self.normalizer)),
        )
    }
}

impl fmt::Debug for RecordingFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingFactory")
            .field("normalizer", &self.normalizer.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speechmatch_audio::{write_wav, Format, WavLoader};
    use speechmatch_speech::{FixedTranscriber, TranscriptionError};
    use std::thread;
    use std::time::Duration;

    fn recording(asr: &Arc<FixedTranscriber>, id: &str) -> Recording {
        Recording::new(id, AudioBuffer::silent(id), asr.clone())
    }

    #[test]
    fn transcript_is_cached() {
        let asr = Arc::new(FixedTranscriber::new().with("A1", [("Three", 0.9)]));
        let rec = recording(&asr, "A1");
        assert!(!rec.is_transcribed());

        let first = rec.transcript().unwrap();
        let second = rec.transcript().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.text(), "three");
        assert_eq!(asr.calls(), 1);
        assert!(rec.is_transcribed());
    }

    #[test]
    fn failure_is_cached_and_not_retried() {
        let asr = Arc::new(FixedTranscriber::new());
        let rec = recording(&asr, "silence");

        for _ in 0..2 {
            let err = rec.transcript().unwrap_err();
            assert!(matches!(err, MatchError::Transcription(TranscriptionError::Empty(_))));
        }
        assert_eq!(asr.calls(), 1);
        assert!(!rec.is_transcribed());
    }

    #[test]
    fn concurrent_first_access_transcribes_once() {
        let asr = Arc::new(
            FixedTranscriber::new()
                .with("A1", [("three", 0.9)])
                .with_latency(Duration::from_millis(50)),
        );
        let rec = Arc::new(recording(&asr, "A1"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rec = Arc::clone(&rec);
                thread::spawn(move || rec.transcript().unwrap())
            })
            .collect();
        let transcripts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(asr.calls(), 1);
        for t in &transcripts[1..] {
            assert!(Arc::ptr_eq(t, &transcripts[0]));
        }
    }

    #[test]
    fn unrelated_recordings_transcribe_in_parallel() {
        let latency = Duration::from_millis(300);
        let asr = Arc::new(
            FixedTranscriber::new()
                .with("A1", [("three", 0.9)])
                .with("B1", [("ten", 0.8)])
                .with_latency(latency),
        );
        let a = Arc::new(recording(&asr, "A1"));
        let b = Arc::new(recording(&asr, "B1"));

        let start = Instant::now();
        let handles: Vec<_> = [a, b]
            .into_iter()
            .map(|rec| thread::spawn(move || rec.transcript().unwrap()))
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let elapsed = start.elapsed();

        assert_eq!(asr.calls(), 2);
        assert!(elapsed < latency * 2, "transcriptions were serialized: {elapsed:?}");
    }

    #[test]
    fn similarity_transcribes_both_sides() {
        let asr = Arc::new(
            FixedTranscriber::new()
                .with("A1", [("three", 0.9)])
                .with("A2", [("three", 0.9)])
                .with("B1", [("ten", 0.8)]),
        );
        let a1 = recording(&asr, "A1");
        let a2 = recording(&asr, "A2");
        let b1 = recording(&asr, "B1");

        let same = a1.similarity(&a2).unwrap();
        let diff = a1.similarity(&b1).unwrap();
        assert!(same > diff);
        assert_eq!(a1.similarity(&b1).unwrap(), b1.similarity(&a1).unwrap());
        assert!(a2.is_transcribed() && b1.is_transcribed());
        assert_eq!(asr.calls(), 3);
    }

    #[test]
    fn similarity_with_named_algorithm() {
        let asr = Arc::new(
            FixedTranscriber::new()
                .with("A1", [("three", 0.9), ("tree", 0.1)])
                .with("B1", [("tree", 0.6)]),
        );
        let a = recording(&asr, "A1");
        let b = recording(&asr, "B1");

        let best = a.similarity_with(&b, "best_text").unwrap();
        assert_eq!(best, 0.6 * crate::algorithm::text_similarity("three", "tree"));
        assert!(a.similarity_with(&a, "overlap").unwrap() > 0.0);
        assert_eq!(
            a.similarity_with(&b, "weighted_levenshtein").unwrap(),
            b.similarity_with(&a, "weighted_levenshtein").unwrap()
        );
    }

    #[test]
    fn similarity_with_unknown_algorithm_fails() {
        let asr = Arc::new(FixedTranscriber::new());
        let a = recording(&asr, "A1");
        let b = recording(&asr, "B1");
        assert!(matches!(a.similarity_with(&b, "nope"), Err(MatchError::Configuration(_))));
        assert_eq!(asr.calls(), 0);
    }

    #[test]
    fn mismatched_normalizers_fail() {
        let asr = Arc::new(FixedTranscriber::new().with("A1", [("three", 0.9)]));
        let plain = recording(&asr, "A1");
        let raw = recording(&asr, "A1").with_normalizer(Arc::new(crate::algorithm::IdentityNormalizer));
        assert!(matches!(plain.similarity(&raw), Err(MatchError::Configuration(_))));
    }

    #[test]
    fn factory_opens_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a1.wav");
        write_wav(&path, &AudioBuffer::new("a1", Format::MONO_16K, vec![0.1; 1600])).unwrap();

        let source = path.to_string_lossy().into_owned();
        let asr = Arc::new(FixedTranscriber::new().with(source.clone(), [("ata", 0.7)]));
        let factory = RecordingFactory::new(Arc::new(WavLoader::new()), asr.clone());

        assert!(factory.supports(&path));
        let rec = factory.open(&path).unwrap();
        assert_eq!(rec.identifier(), source);
        assert_eq!(rec.audio().frames(), 1600);
        assert_eq!(rec.transcript().unwrap().text(), "ata");
    }

    #[test]
    fn factory_reports_unreadable_audio() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new(Arc::new(WavLoader::new()), Arc::new(FixedTranscriber::new()));
        let err = factory.open(&dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, MatchError::AudioLoad(_)));
    }

    #[test]
    fn factory_rejects_unknown_normalizer() {
        let factory = RecordingFactory::new(Arc::new(WavLoader::new()), Arc::new(FixedTranscriber::new()));
        assert!(factory.clone().with_normalizer_name("lowercase").is_ok());
        assert!(matches!(
            factory.with_normalizer_name("nope"),
            Err(MatchError::Configuration(_))
        ));
    }
}
