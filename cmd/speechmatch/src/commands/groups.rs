//! Groups command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::{load_groups, output_result};
use crate::config::Config;
use crate::Cli;

/// List the groups found in a recordings directory.
#[derive(Args)]
pub struct GroupsCommand {
    /// Directory with one sub-directory of recordings per word
    dir: PathBuf,
}

#[derive(Serialize)]
struct GroupSummary {
    identifier: String,
    size: usize,
    recordings: Vec<String>,
}

impl GroupsCommand {
    pub async fn run(&self, cli: &Cli, config: &Config) -> anyhow::Result<()> {
        let factory = config.factory()?;
        let groups = load_groups(&self.dir, &factory).await?;

        let summary: Vec<GroupSummary> = groups
            .iter()
            .map(|g| GroupSummary {
                identifier: g.identifier().to_string(),
                size: g.len(),
                recordings: g.iter().map(|r| r.identifier().to_string()).collect(),
            })
            .collect();

        if cli.json {
            return output_result(&summary, true);
        }
        for g in &summary {
            println!("{}\t{}", g.identifier, g.size);
        }
        Ok(())
    }
}
