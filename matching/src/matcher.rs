use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::{registry, AlgorithmRegistry, Similarity};
use crate::{Group, MatchError, Recording, Transcript};

/// Decision policy for [`Matcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Score every group on a random sample the size of the smallest group.
    pub use_min_group_size: bool,

    /// Report [`Verdict::Indecision`] on a tie instead of picking the
    /// first-listed tied group.
    pub return_indecision: bool,

    /// Similarity algorithm name. Uses the registry default when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,

    /// Groups scoring within `epsilon` of the best are tied with it.
    pub epsilon: f64,

    /// Seed for the balancing sampler. Uses OS entropy when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            use_min_group_size: false,
            return_indecision: false,
            algorithm: None,
            epsilon: 0.0,
            seed: None,
        }
    }
}

impl MatchOptions {
    pub fn with_min_group_size(mut self, enabled: bool) -> Self {
        self.use_min_group_size = enabled;
        self
    }

    pub fn with_indecision(mut self, enabled: bool) -> Self {
        self.return_indecision = enabled;
        self
    }

    pub fn with_algorithm(mut self, name: impl Into<String>) -> Self {
        self.algorithm = Some(name.into());
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), MatchError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(MatchError::Configuration(format!(
                "epsilon must be a finite non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Outcome of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Verdict {
    /// The group at `index` of the input list won.
    Match { index: usize, identifier: String },
    /// Two or more groups tied for the best score.
    Indecision,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Match { identifier, .. } => f.write_str(identifier),
            Verdict::Indecision => f.write_str("(indecision)"),
        }
    }
}

/// Aggregate score of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScore {
    pub identifier: String,
    /// Mean similarity of the query to the scored members; `None` when no
    /// member was scored. Such a group ranks below every scored group.
    pub mean: Option<f64>,
    /// Number of members scored.
    pub scored: usize,
}

impl GroupScore {
    fn rank(&self) -> f64 {
        self.mean.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Verdict plus the score of every listed group, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub verdict: Verdict,
    pub scores: Vec<GroupScore>,
}

impl MatchResult {
    /// Returns the winning group from the list that was matched against.
    pub fn winner<'g>(&self, groups: &'g [Group]) -> Option<&'g Group> {
        match &self.verdict {
            Verdict::Match { index, .. } => groups.get(*index),
            Verdict::Indecision => None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Match { identifier, .. } => Some(identifier),
            Verdict::Indecision => None,
        }
    }

    pub fn is_indecision(&self) -> bool {
        self.verdict == Verdict::Indecision
    }
}

enum RegistrySource {
    Global,
    Owned(Arc<AlgorithmRegistry>),
}

/// Picks the group a query most resembles.
///
/// Each group is scored by the arithmetic mean of the query's similarity to
/// its members. The best-scoring group wins; a tie either yields
/// [`Verdict::Indecision`] or goes to the first-listed tied group, depending
/// on [`MatchOptions::return_indecision`]. Any member whose transcript
/// cannot be produced aborts the whole match.
pub struct Matcher {
    registry: RegistrySource,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    /// Creates a matcher that resolves algorithms in the process-wide
    /// registry.
    pub fn new() -> Self {
        Self {
            registry: RegistrySource::Global,
        }
    }

    /// Creates a matcher that resolves algorithms in `registry`.
    pub fn with_registry(registry: Arc<AlgorithmRegistry>) -> Self {
        Self {
            registry: RegistrySource::Owned(registry),
        }
    }

    fn similarity(&self, name: Option<&str>) -> Result<Arc<dyn Similarity>, MatchError> {
        match &self.registry {
            RegistrySource::Global => registry().read().resolve_similarity(name),
            RegistrySource::Owned(reg) => reg.resolve_similarity(name),
        }
    }

    pub fn match_recording(
        &self,
        query: &Recording,
        groups: &[Group],
        options: &MatchOptions,
    ) -> Result<MatchResult, MatchError> {
        let mut rng = seeded_rng(options.seed);
        self.match_recording_with_rng(query, groups, options, &mut rng)
    }

    pub fn match_recording_with_rng<R: Rng + ?Sized>(
        &self,
        query: &Recording,
        groups: &[Group],
        options: &MatchOptions,
        rng: &mut R,
    ) -> Result<MatchResult, MatchError> {
        let transcript = query.transcript()?;
        debug!(query = query.identifier(), text = transcript.text(), "matching recording");
        self.match_transcript_with_rng(&transcript, groups, options, rng)
    }

    pub fn match_transcript(
        &self,
        query: &Transcript,
        groups: &[Group],
        options: &MatchOptions,
    ) -> Result<MatchResult, MatchError> {
        let mut rng = seeded_rng(options.seed);
        self.match_transcript_with_rng(query, groups, options, &mut rng)
    }

    /// Matches `query` against `groups`, drawing balancing samples from
    /// `rng`. `options.seed` is ignored.
    pub fn match_transcript_with_rng<R: Rng + ?Sized>(
        &self,
        query: &Transcript,
        groups: &[Group],
        options: &MatchOptions,
        rng: &mut R,
    ) -> Result<MatchResult, MatchError> {
        if groups.is_empty() {
            return Err(MatchError::Configuration("no groups to match against".into()));
        }
        options.validate()?;
        let similarity = self.similarity(options.algorithm.as_deref())?;

        let members: Vec<Vec<Arc<Recording>>> = if options.use_min_group_size {
            let m = groups.iter().map(Group::len).min().unwrap_or(0);
            debug!(size = m, "balancing groups");
            groups.iter().map(|g| g.sample(m, &mut *rng)).collect::<Result<_, _>>()?
        } else {
            groups.iter().map(|g| g.recordings().to_vec()).collect()
        };

        let mut scores = Vec::with_capacity(groups.len());
        for (group, members) in groups.iter().zip(&members) {
            let mut pairwise = Vec::with_capacity(members.len());
            for member in members {
                let t = member.transcript()?;
                pairwise.push(query.similarity_using(&t, similarity.as_ref())?);
            }
            let score = GroupScore {
                identifier: group.identifier().to_string(),
                mean: mean(pairwise),
                scored: members.len(),
            };
            debug!(
                group = %score.identifier,
                scored = score.scored,
                mean = ?score.mean,
                algorithm = similarity.name(),
                "scored group"
            );
            scores.push(score);
        }

        let verdict = decide(&scores, options);
        debug!(%verdict, "match decided");
        Ok(MatchResult { verdict, scores })
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Mean of non-negative scores, summed in ascending order so the result is
/// independent of member order.
fn mean(mut scores: Vec<f64>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    scores.sort_by(|a, b| a.total_cmp(b));
    let n = scores.len() as f64;
    Some(scores.into_iter().sum::<f64>() / n)
}

fn decide(scores: &[GroupScore], options: &MatchOptions) -> Verdict {
    let best = scores
        .iter()
        .map(GroupScore::rank)
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = best - options.epsilon;
    let tied: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.rank() >= floor)
        .map(|(i, _)| i)
        .collect();

    if tied.len() > 1 && options.return_indecision {
        return Verdict::Indecision;
    }
    // Non-empty: the best-ranked group always satisfies the floor.
    let index = tied.first().copied().unwrap_or(0);
    Verdict::Match {
        index,
        identifier: scores[index].identifier.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speechmatch_audio::AudioBuffer;
    use speechmatch_speech::{FixedTranscriber, TranscriptionError};

    struct Fixture {
        asr: Arc<FixedTranscriber>,
    }

    impl Fixture {
        fn new(table: &[(&str, &[(&str, f64)])]) -> Self {
            let mut asr = FixedTranscriber::new();
            for (source, candidates) in table {
                asr.insert(*source, candidates.iter().copied());
            }
            Self { asr: Arc::new(asr) }
        }

        fn rec(&self, id: &str) -> Arc<Recording> {
            Arc::new(Recording::new(id, AudioBuffer::silent(id), self.asr.clone()))
        }

        fn group(&self, label: &str, ids: &[&str]) -> Group {
            Group::with_recordings(label, ids.iter().map(|id| self.rec(id)))
        }
    }

    #[test]
    fn picks_most_similar_group() {
        let fx = Fixture::new(&[
            ("q", &[("three", 0.9)]),
            ("a1", &[("three", 0.8)]),
            ("a2", &[("tree", 0.6)]),
            ("b1", &[("ten", 0.9)]),
        ]);
        let groups = [fx.group("three", &["a1", "a2"]), fx.group("ten", &["b1"])];
        let result = Matcher::new()
            .match_recording(&fx.rec("q"), &groups, &MatchOptions::default())
            .unwrap();

        assert_eq!(result.identifier(), Some("three"));
        assert_eq!(result.winner(&groups).map(Group::identifier), Some("three"));
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.scores[0].scored, 2);
        assert!(result.scores[0].mean > result.scores[1].mean);
    }

    #[test]
    fn tie_is_indecision_or_first_listed() {
        let fx = Fixture::new(&[("q", &[("x", 0.5)]), ("a", &[("x", 0.5)]), ("b", &[("x", 0.5)])]);
        let groups = [fx.group("first", &["a"]), fx.group("second", &["b"])];
        let q = fx.rec("q");

        let undecided = Matcher::new()
            .match_recording(&q, &groups, &MatchOptions::default().with_indecision(true))
            .unwrap();
        assert!(undecided.is_indecision());
        assert!(undecided.winner(&groups).is_none());

        let decided = Matcher::new()
            .match_recording(&q, &groups, &MatchOptions::default())
            .unwrap();
        assert_eq!(decided.verdict, Verdict::Match { index: 0, identifier: "first".into() });
    }

    #[test]
    fn epsilon_widens_the_tie() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("ten", 0.9)]), ("b", &[("ten", 0.85)])]);
        let groups = [fx.group("b", &["b"]), fx.group("a", &["a"])];
        let q = fx.rec("q");

        let exact = MatchOptions::default().with_indecision(true);
        let r = Matcher::new().match_recording(&q, &groups, &exact).unwrap();
        assert_eq!(r.identifier(), Some("a"));

        let loose = exact.with_epsilon(0.1);
        let r = Matcher::new().match_recording(&q, &groups, &loose).unwrap();
        assert!(r.is_indecision());

        let loose = loose.with_indecision(false);
        let r = Matcher::new().match_recording(&q, &groups, &loose).unwrap();
        assert_eq!(r.identifier(), Some("b"));
    }

    #[test]
    fn empty_group_never_beats_scored_group() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("zzzz", 0.01)])]);
        let groups = [Group::new("empty"), fx.group("weak", &["a"])];
        let r = Matcher::new()
            .match_recording(&fx.rec("q"), &groups, &MatchOptions::default().with_indecision(true))
            .unwrap();
        assert_eq!(r.identifier(), Some("weak"));
        assert_eq!(r.scores[0].mean, None);
        assert_eq!(r.scores[0].scored, 0);
    }

    #[test]
    fn all_empty_groups_tie() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)])]);
        let groups = [Group::new("a"), Group::new("b")];
        let q = fx.rec("q");
        let r = Matcher::new()
            .match_recording(&q, &groups, &MatchOptions::default().with_indecision(true))
            .unwrap();
        assert!(r.is_indecision());
        let r = Matcher::new().match_recording(&q, &groups, &MatchOptions::default()).unwrap();
        assert_eq!(r.identifier(), Some("a"));
    }

    #[test]
    fn balancing_samples_smallest_size() {
        let fx = Fixture::new(&[
            ("q", &[("ten", 0.9)]),
            ("a0", &[("ten", 0.9)]),
            ("a1", &[("ten", 0.9)]),
            ("b0", &[("tin", 0.9)]),
            ("b1", &[("tin", 0.9)]),
            ("b2", &[("tin", 0.9)]),
            ("b3", &[("tin", 0.9)]),
        ]);
        let groups = [fx.group("ten", &["a0", "a1"]), fx.group("tin", &["b0", "b1", "b2", "b3"])];
        let options = MatchOptions::default().with_min_group_size(true).with_seed(3);
        let r = Matcher::new().match_recording(&fx.rec("q"), &groups, &options).unwrap();
        assert!(r.scores.iter().all(|s| s.scored == 2));
        assert_eq!(r.identifier(), Some("ten"));

        let r = Matcher::new()
            .match_recording(&fx.rec("q"), &groups, &MatchOptions::default())
            .unwrap();
        assert_eq!(r.scores[1].scored, 4);
    }

    #[test]
    fn balancing_with_an_empty_group_scores_nothing() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("ten", 0.9)])]);
        let groups = [fx.group("ten", &["a"]), Group::new("empty")];
        let options = MatchOptions::default().with_min_group_size(true).with_indecision(true);
        let r = Matcher::new().match_recording(&fx.rec("q"), &groups, &options).unwrap();
        assert!(r.scores.iter().all(|s| s.mean.is_none()));
        assert!(r.is_indecision());
    }

    #[test]
    fn failed_member_aborts_match() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("ten", 0.9)])]);
        let groups = [fx.group("ten", &["a", "silent"])];
        let err = Matcher::new()
            .match_recording(&fx.rec("q"), &groups, &MatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::Transcription(TranscriptionError::Empty(_))));
    }

    #[test]
    fn failed_query_aborts_match() {
        let fx = Fixture::new(&[("a", &[("ten", 0.9)])]);
        let groups = [fx.group("ten", &["a"])];
        let err = Matcher::new()
            .match_recording(&fx.rec("missing"), &groups, &MatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::Transcription(_)));
    }

    #[test]
    fn rejects_bad_configuration() {
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("ten", 0.9)])]);
        let q = fx.rec("q");
        let groups = [fx.group("ten", &["a"])];
        let m = Matcher::new();

        assert!(matches!(
            m.match_recording(&q, &[], &MatchOptions::default()),
            Err(MatchError::Configuration(_))
        ));
        assert!(matches!(
            m.match_recording(&q, &groups, &MatchOptions::default().with_algorithm("nope")),
            Err(MatchError::Configuration(_))
        ));
        assert!(matches!(
            m.match_recording(&q, &groups, &MatchOptions::default().with_epsilon(-1.0)),
            Err(MatchError::Configuration(_))
        ));
    }

    #[test]
    fn owned_registry_algorithms() {
        let mut reg = AlgorithmRegistry::with_defaults();
        reg.register_similarity_fn("by_length", |a, b| {
            1.0 / (1.0 + (a.text().len() as f64 - b.text().len() as f64).abs())
        });
        let fx = Fixture::new(&[("q", &[("abcd", 0.9)]), ("a", &[("wxyz", 0.9)]), ("b", &[("ab", 0.9)])]);
        let groups = [fx.group("two", &["b"]), fx.group("four", &["a"])];
        let options = MatchOptions::default().with_algorithm("by_length");

        let r = Matcher::with_registry(Arc::new(reg))
            .match_recording(&fx.rec("q"), &groups, &options)
            .unwrap();
        assert_eq!(r.identifier(), Some("four"));
        assert!(Matcher::new().match_recording(&fx.rec("q"), &groups, &options).is_err());
    }

    #[test]
    fn invalid_scores_are_configuration_errors() {
        let mut reg = AlgorithmRegistry::with_defaults();
        reg.register_similarity_fn("broken", |_, _| f64::NAN);
        let fx = Fixture::new(&[("q", &[("ten", 0.9)]), ("a", &[("ten", 0.9)])]);
        let groups = [fx.group("ten", &["a"])];
        let err = Matcher::with_registry(Arc::new(reg))
            .match_recording(&fx.rec("q"), &groups, &MatchOptions::default().with_algorithm("broken"))
            .unwrap_err();
        assert!(matches!(err, MatchError::Configuration(_)));
    }

    fn query(normalizer: &str, pairs: &[(&str, f64)]) -> Transcript {
        let candidates = pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect();
        Transcript::new(candidates, normalizer).unwrap()
    }

    #[test]
    fn matches_a_transcript_query() {
        let fx = Fixture::new(&[("a1", &[("three", 0.8)]), ("a2", &[("tree", 0.6)]), ("b1", &[("ten", 0.9)])]);
        let groups = [fx.group("ten", &["b1"]), fx.group("three", &["a1", "a2"])];

        let r = Matcher::new()
            .match_transcript(&query("plain", &[("Three", 0.9)]), &groups, &MatchOptions::default())
            .unwrap();
        assert_eq!(r.verdict, Verdict::Match { index: 1, identifier: "three".into() });
        assert_eq!(r.scores[1].scored, 2);
    }

    #[test]
    fn transcript_query_with_other_normalizer_fails() {
        let fx = Fixture::new(&[("a1", &[("three", 0.8)])]);
        let groups = [fx.group("three", &["a1"])];

        let err = Matcher::new()
            .match_transcript(&query("identity", &[("three", 0.9)]), &groups, &MatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::Configuration(_)));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: MatchOptions =
            serde_json::from_str(r#"{"use_min_group_size": true, "seed": 9}"#).unwrap();
        assert!(opts.use_min_group_size);
        assert!(!opts.return_indecision);
        assert_eq!(opts.seed, Some(9));
        assert_eq!(opts.epsilon, 0.0);
    }

    #[test]
    fn verdict_serialization() {
        let v = Verdict::Match { index: 1, identifier: "ten".into() };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "match");
        assert_eq!(json["identifier"], "ten");
        assert_eq!(serde_json::to_value(Verdict::Indecision).unwrap()["kind"], "indecision");
    }
}
