//! Match command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use speechmatch_matching::{MatchOptions, MatchResult, Matcher};

use super::{load_groups, members, open_recording, output_result, warm_transcripts};
use crate::config::Config;
use crate::Cli;

/// Match a recording against the groups of a recordings directory.
#[derive(Args)]
pub struct MatchCommand {
    /// Audio file (WAV) to identify
    audio: PathBuf,

    /// Directory with one sub-directory of recordings per word
    #[arg(long)]
    groups: PathBuf,

    /// Sample every group down to the smallest group's size
    #[arg(long)]
    balance: bool,

    /// Report ties as undecided instead of picking the first group
    #[arg(long)]
    indecision: bool,

    /// Similarity algorithm (overrides config file)
    #[arg(long)]
    algorithm: Option<String>,

    /// Tie tolerance (overrides config file)
    #[arg(long)]
    epsilon: Option<f64>,

    /// Seed for balancing (overrides config file)
    #[arg(long)]
    seed: Option<u64>,
}

impl MatchCommand {
    fn options(&self, config: &Config) -> MatchOptions {
        let mut options = config.matching.clone();
        options.use_min_group_size |= self.balance;
        options.return_indecision |= self.indecision;
        if let Some(a) = &self.algorithm {
            options.algorithm = Some(a.clone());
        }
        if let Some(e) = self.epsilon {
            options.epsilon = e;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options
    }

    pub async fn run(&self, cli: &Cli, config: &Config) -> anyhow::Result<()> {
        let factory = config.factory()?;
        let groups = load_groups(&self.groups, &factory).await?;
        let query = open_recording(&self.audio, &factory).await?;
        warm_transcripts(members(&groups).chain([&query])).await?;

        let options = self.options(config);
        let result = Matcher::new()
            .match_recording(&query, &groups, &options)
            .with_context(|| format!("failed to match {}", query.identifier()))?;

        if cli.json {
            return output_result(&result, true);
        }
        print_result(&result);
        Ok(())
    }
}

pub(crate) fn print_result(result: &MatchResult) {
    println!("{}", result.verdict);
    for s in &result.scores {
        match s.mean {
            Some(mean) => println!("  {:<16} {:.4}  ({} scored)", s.identifier, mean, s.scored),
            None => println!("  {:<16} -       (empty)", s.identifier),
        }
    }
}
