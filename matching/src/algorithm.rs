//! Named normalization and similarity algorithms.
//!
//! A [`Transcript`] records the name of the [`Normalizer`] its candidate
//! texts were derived with; two transcripts are only comparable when those
//! names agree. The [`Similarity`] used to compare them is chosen by name at
//! comparison time. Both kinds live in an [`AlgorithmRegistry`], and a
//! process-wide registry pre-populated with the built-in algorithms is
//! available through [`registry`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{MatchError, Transcript};

/// Name of the default similarity algorithm.
pub const DEFAULT_SIMILARITY: &str = "weighted_levenshtein";
/// Name of the default normalizer.
pub const DEFAULT_NORMALIZER: &str = "plain";

/// Rewrites candidate texts into the form they are compared in.
pub trait Normalizer: Send + Sync {
    fn name(&self) -> &str;

    fn normalize(&self, text: &str) -> String;
}

/// Scores how alike two transcripts are.
///
/// Implementations must return a finite, non-negative score, be symmetric
/// (`similarity(a, b) == similarity(b, a)`), and reach their maximum for a
/// given `a` at `similarity(a, a)`.
pub trait Similarity: Send + Sync {
    fn name(&self) -> &str;

    fn similarity(&self, a: &Transcript, b: &Transcript) -> f64;
}

/// Leaves texts unchanged.
pub struct IdentityNormalizer;

impl Normalizer for IdentityNormalizer {
    fn name(&self) -> &str {
        "identity"
    }

    fn normalize(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Lower-cases texts.
pub struct LowercaseNormalizer;

impl Normalizer for LowercaseNormalizer {
    fn name(&self) -> &str {
        "lowercase"
    }

    fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
    }
}

/// Lower-cases, turns word separators (`|`, `_`, whitespace) into single
/// spaces and drops everything but letters, digits and apostrophes.
pub struct PlainNormalizer;

impl Normalizer for PlainNormalizer {
    fn name(&self) -> &str {
        DEFAULT_NORMALIZER
    }

    fn normalize(&self, text: &str) -> String {
        let mapped: String = text
            .to_lowercase()
            .chars()
            .filter_map(|c| match c {
                '|' | '_' => Some(' '),
                c if c.is_whitespace() => Some(' '),
                c if c.is_alphanumeric() || c == '\'' => Some(c),
                _ => None,
            })
            .collect();
        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Levenshtein distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized edit similarity in [0, 1]: `1 - distance / longer length`.
/// Two empty strings are identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Sums non-negative terms in ascending order so the result does not depend
/// on the order they were produced in.
fn canonical_sum(mut terms: Vec<f64>) -> f64 {
    terms.sort_by(|a, b| a.total_cmp(b));
    terms.into_iter().sum()
}

/// Pairs candidates that are each other's closest match and sums
/// `min(p_a, p_b) * text_similarity(a, b)` over those pairs.
///
/// A candidate's closest match is the one with the highest text similarity;
/// ties go to the more probable candidate, then the lexicographically
/// smaller text. Since every candidate joins at most one pair, the score of
/// `a` against anything is bounded by the sum of `a`'s probabilities, which
/// is exactly `a`'s score against itself.
pub struct WeightedLevenshtein;

impl WeightedLevenshtein {
    fn closest(side: &[(&str, f64)], score: impl Fn(usize) -> f64) -> usize {
        let mut best = 0;
        for k in 1..side.len() {
            let ord = score(k)
                .total_cmp(&score(best))
                .then(side[k].1.total_cmp(&side[best].1))
                .then(side[best].0.cmp(side[k].0));
            if ord == Ordering::Greater {
                best = k;
            }
        }
        best
    }
}

impl Similarity for WeightedLevenshtein {
    fn name(&self) -> &str {
        DEFAULT_SIMILARITY
    }

    fn similarity(&self, a: &Transcript, b: &Transcript) -> f64 {
        let left: Vec<(&str, f64)> = a.candidates().iter().map(|(t, &p)| (t.as_str(), p)).collect();
        let right: Vec<(&str, f64)> = b.candidates().iter().map(|(t, &p)| (t.as_str(), p)).collect();
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let sims: Vec<Vec<f64>> = left
            .iter()
            .map(|(ta, _)| right.iter().map(|(tb, _)| text_similarity(ta, tb)).collect())
            .collect();
        let closest_right: Vec<usize> = (0..left.len())
            .map(|i| Self::closest(&right, |j| sims[i][j]))
            .collect();
        let closest_left: Vec<usize> = (0..right.len())
            .map(|j| Self::closest(&left, |i| sims[i][j]))
            .collect();

        let terms = closest_right
            .iter()
            .enumerate()
            .filter(|&(i, &j)| closest_left[j] == i)
            .map(|(i, &j)| left[i].1.min(right[j].1) * sims[i][j])
            .collect();
        canonical_sum(terms)
    }
}

/// Compares only the most likely texts, weighted by the smaller of their
/// probabilities.
pub struct BestText;

impl Similarity for BestText {
    fn name(&self) -> &str {
        "best_text"
    }

    fn similarity(&self, a: &Transcript, b: &Transcript) -> f64 {
        let (ta, tb) = (a.text(), b.text());
        let pa = a.probability(ta).unwrap_or(0.0);
        let pb = b.probability(tb).unwrap_or(0.0);
        pa.min(pb) * text_similarity(ta, tb)
    }
}

/// Intersection of the two probability histograms: the sum over texts
/// present in both of the smaller probability.
pub struct Overlap;

impl Similarity for Overlap {
    fn name(&self) -> &str {
        "overlap"
    }

    fn similarity(&self, a: &Transcript, b: &Transcript) -> f64 {
        let terms = a
            .candidates()
            .iter()
            .filter_map(|(t, &pa)| b.probability(t).map(|pb| pa.min(pb)))
            .collect();
        canonical_sum(terms)
    }
}

type SimilarityFn = dyn Fn(&Transcript, &Transcript) -> f64 + Send + Sync;

/// Adapts a plain function into a [`Similarity`].
pub struct FnSimilarity {
    name: String,
    f: Box<SimilarityFn>,
}

impl FnSimilarity {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Transcript, &Transcript) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Similarity for FnSimilarity {
    fn name(&self) -> &str {
        &self.name
    }

    fn similarity(&self, a: &Transcript, b: &Transcript) -> f64 {
        (self.f)(a, b)
    }
}

/// Name-keyed lookup of normalizers and similarity algorithms.
pub struct AlgorithmRegistry {
    similarities: HashMap<String, Arc<dyn Similarity>>,
    normalizers: HashMap<String, Arc<dyn Normalizer>>,
    default_similarity: String,
    default_normalizer: String,
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("similarities", &self.similarity_names())
            .field("normalizers", &self.normalizer_names())
            .field("default_similarity", &self.default_similarity)
            .field("default_normalizer", &self.default_normalizer)
            .finish()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AlgorithmRegistry {
    /// Creates a registry holding the built-in algorithms.
    pub fn with_defaults() -> Self {
        let mut reg = Self {
            similarities: HashMap::new(),
            normalizers: HashMap::new(),
            default_similarity: DEFAULT_SIMILARITY.to_string(),
            default_normalizer: DEFAULT_NORMALIZER.to_string(),
        };
        reg.register_similarity(Arc::new(WeightedLevenshtein));
        reg.register_similarity(Arc::new(BestText));
        reg.register_similarity(Arc::new(Overlap));
        reg.register_normalizer(Arc::new(IdentityNormalizer));
        reg.register_normalizer(Arc::new(LowercaseNormalizer));
        reg.register_normalizer(Arc::new(PlainNormalizer));
        reg
    }

    /// Registers a similarity algorithm under its own name, returning the
    /// one it replaced.
    pub fn register_similarity(&mut self, algorithm: Arc<dyn Similarity>) -> Option<Arc<dyn Similarity>> {
        self.similarities.insert(algorithm.name().to_string(), algorithm)
    }

    /// Registers a function as a similarity algorithm.
    pub fn register_similarity_fn<F>(&mut self, name: &str, f: F) -> Option<Arc<dyn Similarity>>
    where
        F: Fn(&Transcript, &Transcript) -> f64 + Send + Sync + 'static,
    {
        self.register_similarity(Arc::new(FnSimilarity::new(name, f)))
    }

    /// Registers a normalizer under its own name, returning the one it
    /// replaced.
    pub fn register_normalizer(&mut self, normalizer: Arc<dyn Normalizer>) -> Option<Arc<dyn Normalizer>> {
        self.normalizers.insert(normalizer.name().to_string(), normalizer)
    }

    /// Looks up a similarity algorithm.
    pub fn similarity(&self, name: &str) -> Result<Arc<dyn Similarity>, MatchError> {
        self.similarities.get(name).cloned().ok_or_else(|| {
            MatchError::Configuration(format!(
                "unknown similarity algorithm {name:?} (known: {})",
                self.similarity_names().join(", ")
            ))
        })
    }

    /// Looks up a normalizer.
    pub fn normalizer(&self, name: &str) -> Result<Arc<dyn Normalizer>, MatchError> {
        self.normalizers.get(name).cloned().ok_or_else(|| {
            MatchError::Configuration(format!(
                "unknown normalizer {name:?} (known: {})",
                self.normalizer_names().join(", ")
            ))
        })
    }

    /// Looks up `name`, or the default similarity when `name` is `None`.
    pub fn resolve_similarity(&self, name: Option<&str>) -> Result<Arc<dyn Similarity>, MatchError> {
        self.similarity(name.unwrap_or(&self.default_similarity))
    }

    /// Looks up `name`, or the default normalizer when `name` is `None`.
    pub fn resolve_normalizer(&self, name: Option<&str>) -> Result<Arc<dyn Normalizer>, MatchError> {
        self.normalizer(name.unwrap_or(&self.default_normalizer))
    }

    pub fn default_similarity(&self) -> &str {
        &self.default_similarity
    }

    pub fn default_normalizer(&self) -> &str {
        &self.default_normalizer
    }

    /// Makes an already registered similarity the default.
    pub fn set_default_similarity(&mut self, name: &str) -> Result<(), MatchError> {
        self.similarity(name)?;
        self.default_similarity = name.to_string();
        Ok(())
    }

    /// Makes an already registered normalizer the default.
    pub fn set_default_normalizer(&mut self, name: &str) -> Result<(), MatchError> {
        self.normalizer(name)?;
        self.default_normalizer = name.to_string();
        Ok(())
    }

    /// Returns the registered similarity names, sorted.
    pub fn similarity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.similarities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the registered normalizer names, sorted.
    pub fn normalizer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.normalizers.keys().cloned().collect();
        names.sort();
        names
    }
}

static REGISTRY: Lazy<RwLock<AlgorithmRegistry>> =
    Lazy::new(|| RwLock::new(AlgorithmRegistry::with_defaults()));

/// Returns the process-wide registry.
pub fn registry() -> &'static RwLock<AlgorithmRegistry> {
    &REGISTRY
}
