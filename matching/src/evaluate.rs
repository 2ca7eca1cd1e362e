use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Group, MatchError, MatchOptions, MatchResult, Matcher, Verdict};

/// How one held-out recording was classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    Correct,
    Wrong { predicted: String },
    Undecided,
}

/// One leave-one-out trial.
#[derive(Debug, Clone, Serialize)]
pub struct Trial {
    pub recording: String,
    pub outcome: Outcome,
    pub result: MatchResult,
}

/// Result of [`evaluate_leave_one_out`].
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub group: String,
    pub trials: Vec<Trial>,
}

impl Evaluation {
    pub fn correct(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Correct))
    }

    pub fn wrong(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Wrong { .. }))
    }

    pub fn undecided(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Undecided))
    }

    /// Fraction of trials classified correctly, or `None` without trials.
    pub fn accuracy(&self) -> Option<f64> {
        if self.trials.is_empty() {
            return None;
        }
        Some(self.correct() as f64 / self.trials.len() as f64)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.trials.iter().filter(|t| pred(&t.outcome)).count()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} trials, {} correct, {} wrong, {} undecided",
            self.group,
            self.trials.len(),
            self.correct(),
            self.wrong(),
            self.undecided()
        )
    }
}

/// Holds out up to `count` random recordings of group `group_id` one at a
/// time and matches each against all groups without it.
///
/// `groups` is left untouched; trials run against a copy. The first
/// matching error aborts the evaluation.
pub fn evaluate_leave_one_out<R: Rng + ?Sized>(
    groups: &[Group],
    group_id: &str,
    count: usize,
    options: &MatchOptions,
    rng: &mut R,
) -> Result<Evaluation, MatchError> {
    let index = groups
        .iter()
        .position(|g| g.identifier() == group_id)
        .ok_or_else(|| MatchError::Configuration(format!("unknown group {group_id:?}")))?;

    let mut working = groups.to_vec();
    let k = count.min(working[index].len());
    let held_out = working[index].sample(k, &mut *rng)?;
    let matcher = Matcher::new();

    let mut trials = Vec::with_capacity(k);
    for recording in held_out {
        working[index].remove(&recording)?;
        let result = matcher.match_recording_with_rng(&recording, &working, options, &mut *rng);
        working[index].add(recording.clone());
        let result = result?;

        let outcome = match &result.verdict {
            Verdict::Match { identifier, .. } if identifier == group_id => Outcome::Correct,
            Verdict::Match { identifier, .. } => Outcome::Wrong {
                predicted: identifier.clone(),
            },
            Verdict::Indecision => Outcome::Undecided,
        };
        debug!(recording = recording.identifier(), ?outcome, "trial");
        trials.push(Trial {
            recording: recording.identifier().to_string(),
            outcome,
            result,
        });
    }

    let evaluation = Evaluation {
        group: group_id.to_string(),
        trials,
    };
    info!(
        group = group_id,
        trials = evaluation.trials.len(),
        correct = evaluation.correct(),
        wrong = evaluation.wrong(),
        undecided = evaluation.undecided(),
        "leave-one-out evaluation"
    );
    Ok(evaluation)
}
