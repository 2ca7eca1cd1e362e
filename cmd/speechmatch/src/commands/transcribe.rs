//! Transcribe command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use super::{open_recording, output_result};
use crate::config::Config;
use crate::Cli;

/// Print the most likely text and the probable alternatives of a recording.
#[derive(Args)]
pub struct TranscribeCommand {
    /// Audio file (WAV)
    audio: PathBuf,

    /// Only list candidates at least this probable
    #[arg(long, default_value_t = 0.0)]
    min_probability: f64,
}

#[derive(Serialize)]
struct Candidate {
    text: String,
    probability: f64,
}

#[derive(Serialize)]
struct TranscribeOutput {
    recording: String,
    text: String,
    normalizer: String,
    candidates: Vec<Candidate>,
}

impl TranscribeCommand {
    pub async fn run(&self, cli: &Cli, config: &Config) -> anyhow::Result<()> {
        let factory = config.factory()?;
        let recording = open_recording(&self.audio, &factory).await?;

        let rec = Arc::clone(&recording);
        let transcript = tokio::task::spawn_blocking(move || rec.transcript())
            .await?
            .with_context(|| format!("failed to transcribe {}", recording.identifier()))?;

        let mut candidates: Vec<Candidate> = transcript
            .probable_texts(self.min_probability)
            .into_iter()
            .map(|(text, probability)| Candidate { text, probability })
            .collect();
        candidates.sort_by(|a, b| b.probability.total_cmp(&a.probability).then_with(|| a.text.cmp(&b.text)));

        let output = TranscribeOutput {
            recording: recording.identifier().to_string(),
            text: transcript.text().to_string(),
            normalizer: transcript.algorithm().to_string(),
            candidates,
        };

        if cli.json {
            return output_result(&output, true);
        }
        println!("{}", output.text);
        for c in &output.candidates {
            println!("  {:.4}  {}", c.probability, c.text);
        }
        Ok(())
    }
}
