use std::fmt;

use serde::Serialize;
use speechmatch_speech::{validate_candidates, Candidates, TranscriptionError};

use crate::algorithm::{registry, Normalizer, Similarity};
use crate::MatchError;

/// What was (probably) said in one recording.
///
/// A transcript maps normalized candidate texts to probabilities. It is
/// never empty and never changes after construction. `algorithm` names the
/// [`Normalizer`] the texts were derived with; only transcripts sharing it
/// can be compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    candidates: Candidates,
    algorithm: String,
}

impl Transcript {
    /// Builds a transcript, normalizing texts with the named normalizer from
    /// the process-wide registry.
    pub fn new(candidates: Candidates, normalizer: &str) -> Result<Self, MatchError> {
        let normalizer = registry().read().normalizer(normalizer)?;
        Self::with_normalizer(candidates, normalizer.as_ref())
    }

    /// Builds a transcript, normalizing texts with `normalizer`.
    ///
    /// Texts that normalize to the same string are merged, keeping the
    /// higher probability. Texts that normalize to nothing are dropped.
    pub fn with_normalizer(candidates: Candidates, normalizer: &dyn Normalizer) -> Result<Self, MatchError> {
        Self::for_source("transcript", candidates, normalizer)
    }

    pub(crate) fn for_source(
        source: &str,
        candidates: Candidates,
        normalizer: &dyn Normalizer,
    ) -> Result<Self, MatchError> {
        validate_candidates(source, &candidates)?;

        let mut normalized = Candidates::new();
        for (text, p) in candidates {
            let text = normalizer.normalize(&text);
            if text.is_empty() {
                continue;
            }
            let slot = normalized.entry(text).or_insert(p);
            if p > *slot {
                *slot = p;
            }
        }
        if normalized.is_empty() {
            return Err(TranscriptionError::Empty(source.to_string()).into());
        }

        Ok(Self {
            candidates: normalized,
            algorithm: normalizer.name().to_string(),
        })
    }

    /// Returns the most likely text. Equally likely texts resolve to the
    /// lexicographically smallest.
    pub fn text(&self) -> &str {
        let mut best: Option<(&str, f64)> = None;
        // BTreeMap iterates in ascending key order, so strict `>` keeps the
        // smallest text among equals.
        for (text, &p) in &self.candidates {
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((text, p)),
            }
        }
        best.map(|(t, _)| t).unwrap_or_default()
    }

    /// Returns every candidate with probability at least `min_probability`.
    /// The result may be empty.
    pub fn probable_texts(&self, min_probability: f64) -> Candidates {
        self.candidates
            .iter()
            .filter(|&(_, &p)| p >= min_probability)
            .map(|(t, &p)| (t.clone(), p))
            .collect()
    }

    pub fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    /// Name of the normalizer the candidate texts were derived with.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn probability(&self, text: &str) -> Option<f64> {
        self.candidates.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Scores this transcript against `other` with the default similarity
    /// algorithm of the process-wide registry.
    pub fn similarity(&self, other: &Transcript) -> Result<f64, MatchError> {
        let algorithm = registry().read().resolve_similarity(None)?;
        self.similarity_using(other, algorithm.as_ref())
    }

    /// Scores this transcript against `other` with a named algorithm from
    /// the process-wide registry.
    pub fn similarity_with(&self, other: &Transcript, algorithm: &str) -> Result<f64, MatchError> {
        let algorithm = registry().read().similarity(algorithm)?;
        self.similarity_using(other, algorithm.as_ref())
    }

    /// Scores this transcript against `other` with `algorithm`.
    ///
    /// Fails with [`MatchError::Configuration`] when the transcripts were
    /// normalized differently or the algorithm yields a negative or
    /// non-finite score.
    pub fn similarity_using(&self, other: &Transcript, algorithm: &dyn Similarity) -> Result<f64, MatchError> {
        self.ensure_compatible(other)?;
        let score = algorithm.similarity(self, other);
        if !score.is_finite() || score < 0.0 {
            return Err(MatchError::Configuration(format!(
                "similarity algorithm {:?} produced invalid score {score}",
                algorithm.name()
            )));
        }
        Ok(score)
    }

    /// Fails unless both transcripts were derived with the same normalizer.
    pub fn ensure_compatible(&self, other: &Transcript) -> Result<(), MatchError> {
        if self.algorithm != other.algorithm {
            return Err(MatchError::Configuration(format!(
                "cannot compare transcripts normalized with {:?} and {:?}",
                self.algorithm, other.algorithm
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.text();
        let p = self.probability(text).unwrap_or_default();
        write!(f, "{text:?} ({p:.2}, {} candidates)", self.candidates.len())
    }
}
