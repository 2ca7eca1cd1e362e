//! CTC emissions and decoding.
//!
//! A CTC acoustic model emits, for every time step, a probability for each
//! token of its inventory plus a blank. The text is recovered by collapsing
//! repeated tokens and removing blanks. [`CtcDecoder::decode`] keeps several
//! hypotheses alive with a prefix beam search so that the result is a set of
//! candidate texts with probabilities rather than a single string.
//!
//! # Emission file format
//!
//! ```text
//! a b c | ' #          <- token inventory, blank last
//! 0.01 0.90 ... 0.02   <- one line per time step, one value per token
//! ...
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Candidates, TranscriptionError};

/// Token reserved for the CTC blank.
pub const BLANK_TOKEN: &str = "#";
/// Token marking a word boundary; rendered as a space.
pub const WORD_SEPARATOR: &str = "|";

/// Per-timestep token probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Emissions {
    tokens: Vec<String>,
    frames: Vec<Vec<f32>>,
    blank: usize,
}

impl Emissions {
    /// Creates emissions from a token inventory and frames.
    ///
    /// The blank is the token `#` if present, otherwise the last token.
    pub fn new(tokens: Vec<String>, frames: Vec<Vec<f32>>) -> Result<Self, TranscriptionError> {
        if tokens.is_empty() {
            return Err(TranscriptionError::InvalidOutput("empty token inventory".into()));
        }
        for (i, frame) in frames.iter().enumerate() {
            if frame.len() != tokens.len() {
                return Err(TranscriptionError::InvalidOutput(format!(
                    "frame {i} has {} values, expected {}",
                    frame.len(),
                    tokens.len()
                )));
            }
            if let Some(p) = frame.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(TranscriptionError::InvalidOutput(format!(
                    "frame {i} has invalid probability {p}"
                )));
            }
        }
        let blank = tokens
            .iter()
            .position(|t| t == BLANK_TOKEN)
            .unwrap_or(tokens.len() - 1);
        Ok(Self {
            tokens,
            frames,
            blank,
        })
    }

    /// Parses the text written by the acoustic-model binary.
    pub fn parse(text: &str) -> Result<Self, TranscriptionError> {
        let mut lines = text.lines();
        let tokens: Vec<String> = lines
            .next()
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut frames = Vec::new();
        for (n, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame = line
                .split_whitespace()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TranscriptionError::InvalidOutput(format!("line {}: {e}", n + 2)))?;
            frames.push(frame);
        }
        Self::new(tokens, frames)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    /// Returns the index of the blank token.
    pub fn blank(&self) -> usize {
        self.blank
    }

    /// Returns the number of time steps.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn render(&self, labels: &[usize]) -> String {
        let raw: String = labels
            .iter()
            .map(|&i| {
                let t = self.tokens[i].as_str();
                if t == WORD_SEPARATOR { " " } else { t }
            })
            .collect();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Configuration for [`CtcDecoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CtcConfig {
    /// Number of prefixes kept after each time step (default: 16).
    pub beam_width: usize,
    /// Maximum number of candidate texts returned (default: 8).
    pub max_candidates: usize,
    /// Tokens below this probability are not expanded (default: 0.001).
    /// The blank is always expanded.
    pub min_token_probability: f32,
}

impl Default for CtcConfig {
    fn default() -> Self {
        Self {
            beam_width: 16,
            max_candidates: 8,
            min_token_probability: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BeamProb {
    blank: f64,
    non_blank: f64,
}

impl BeamProb {
    fn total(&self) -> f64 {
        self.blank + self.non_blank
    }
}

/// Decodes [`Emissions`] into candidate texts.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    config: CtcConfig,
}

impl Default for CtcDecoder {
    fn default() -> Self {
        Self::new(CtcConfig::default())
    }
}

impl CtcDecoder {
    /// Creates a decoder; zero widths fall back to the defaults.
    pub fn new(config: CtcConfig) -> Self {
        let defaults = CtcConfig::default();
        let beam_width = if config.beam_width > 0 {
            config.beam_width
        } else {
            defaults.beam_width
        };
        let max_candidates = if config.max_candidates > 0 {
            config.max_candidates
        } else {
            defaults.max_candidates
        };
        let min_token_probability = if config.min_token_probability >= 0.0 {
            config.min_token_probability
        } else {
            defaults.min_token_probability
        };
        Self {
            config: CtcConfig {
                beam_width,
                max_candidates,
                min_token_probability,
            },
        }
    }

    pub fn config(&self) -> &CtcConfig {
        &self.config
    }

    /// Runs a CTC prefix beam search.
    ///
    /// Each returned probability is the total probability of all surviving
    /// paths that collapse to that text, clamped to 1. Empty texts are
    /// dropped, so the result is empty when the model heard only blanks.
    pub fn decode(&self, emissions: &Emissions) -> Candidates {
        let blank = emissions.blank();
        let mut beams: Vec<(Vec<usize>, BeamProb)> = vec![(
            Vec::new(),
            BeamProb {
                blank: 1.0,
                non_blank: 0.0,
            },
        )];

        for frame in emissions.frames() {
            let active: Vec<(usize, f64)> = frame
                .iter()
                .enumerate()
                .filter(|&(i, &p)| i == blank || p >= self.config.min_token_probability)
                .map(|(i, &p)| (i, p as f64))
                .collect();

            let mut next: HashMap<Vec<usize>, BeamProb> = HashMap::with_capacity(beams.len() * 2);
            for (prefix, prob) in &beams {
                for &(token, p) in &active {
                    if token == blank {
                        next.entry(prefix.clone()).or_default().blank += prob.total() * p;
                        continue;
                    }

                    let mut extended = prefix.clone();
                    extended.push(token);
                    if prefix.last() == Some(&token) {
                        // A repeat only extends the prefix across a blank.
                        next.entry(extended).or_default().non_blank += prob.blank * p;
                        next.entry(prefix.clone()).or_default().non_blank += prob.non_blank * p;
                    } else {
                        next.entry(extended).or_default().non_blank += prob.total() * p;
                    }
                }
            }

            let mut ranked: Vec<(Vec<usize>, BeamProb)> = next.into_iter().collect();
            ranked.sort_by(|a, b| {
                b.1.total()
                    .total_cmp(&a.1.total())
                    .then_with(|| a.0.cmp(&b.0))
            });
            ranked.truncate(self.config.beam_width);
            beams = ranked;
        }

        let mut merged = Candidates::new();
        for (prefix, prob) in &beams {
            let text = emissions.render(prefix);
            if text.is_empty() || prob.total() <= 0.0 {
                continue;
            }
            *merged.entry(text).or_insert(0.0) += prob.total();
        }

        let mut ranked: Vec<(String, f64)> = merged.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.config.max_candidates);
        ranked.into_iter().map(|(t, p)| (t, p.min(1.0))).collect()
    }

    /// Returns the greedy (best path) transcription: the most probable token
    /// of every frame, repeats collapsed, blanks removed.
    pub fn best_path(&self, emissions: &Emissions) -> String {
        let mut labels = Vec::new();
        let mut previous = None;
        for frame in emissions.frames() {
            let mut best = 0;
            for (i, &p) in frame.iter().enumerate() {
                if p > frame[best] {
                    best = i;
                }
            }
            if previous != Some(best) && best != emissions.blank() {
                labels.push(best);
            }
            previous = Some(best);
        }
        emissions.render(&labels)
    }
}
