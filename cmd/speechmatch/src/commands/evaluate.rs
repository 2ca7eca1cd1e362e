//! Evaluate command.

use std::path::PathBuf;

use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use speechmatch_matching::{evaluate_leave_one_out, MatchOptions, Outcome};

use super::{load_groups, members, output_result, warm_transcripts};
use crate::config::Config;
use crate::Cli;

/// Hold out recordings of one group and match each against all groups.
#[derive(Args)]
pub struct EvaluateCommand {
    /// Directory with one sub-directory of recordings per word
    #[arg(long)]
    groups: PathBuf,

    /// Group whose recordings are held out
    #[arg(long)]
    group: String,

    /// Number of recordings to hold out
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Sample every group down to the smallest group's size
    #[arg(long)]
    balance: bool,

    /// Count ties as undecided instead of picking the first group
    #[arg(long)]
    indecision: bool,

    /// Seed for choosing held-out recordings and balancing samples
    #[arg(long)]
    seed: Option<u64>,
}

impl EvaluateCommand {
    fn options(&self, config: &Config) -> MatchOptions {
        let mut options = config.matching.clone();
        options.use_min_group_size |= self.balance;
        options.return_indecision |= self.indecision;
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options
    }

    pub async fn run(&self, cli: &Cli, config: &Config) -> anyhow::Result<()> {
        let factory = config.factory()?;
        let groups = load_groups(&self.groups, &factory).await?;
        warm_transcripts(members(&groups)).await?;

        let options = self.options(config);
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let evaluation = evaluate_leave_one_out(&groups, &self.group, self.count, &options, &mut rng)?;

        if cli.json {
            return output_result(&evaluation, true);
        }
        for trial in &evaluation.trials {
            let outcome = match &trial.outcome {
                Outcome::Correct => "correct".to_string(),
                Outcome::Wrong { predicted } => format!("wrong ({predicted})"),
                Outcome::Undecided => "undecided".to_string(),
            };
            println!("{}\t{}", trial.recording, outcome);
        }
        println!("{evaluation}");
        if let Some(accuracy) = evaluation.accuracy() {
            println!("accuracy {:.1}%", accuracy * 100.0);
        }
        Ok(())
    }
}
