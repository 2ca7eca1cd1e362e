//! Interactive session command.
//!
//! Reads one instruction per line from stdin:
//!
//! ```text
//! word <label>    start teaching a new word
//! add <audio>     add a recording to the word, or match it when interpreting
//! interpret       switch from teaching to matching
//! new             forget every word
//! quit            leave
//! ```

use std::path::Path;

use clap::Args;
use speechmatch_matching::{Session, SessionError, Submission, Verdict};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{members, open_recording, warm_transcripts};
use crate::commands::matching::print_result;
use crate::config::Config;
use crate::Cli;

/// Interactive register-then-recognize session on stdin.
#[derive(Args)]
pub struct SessionCommand {
    /// Sample every group down to the smallest group's size
    #[arg(long)]
    balance: bool,
}

impl SessionCommand {
    pub async fn run(&self, cli: &Cli, config: &Config) -> anyhow::Result<()> {
        let factory = config.factory()?;
        let mut options = config.matching.clone();
        options.use_min_group_size |= self.balance;
        let mut session = Session::with_options(options);

        println!("Ready for new words.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            let (cmd, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));
            match cmd {
                "" => continue,
                "quit" | "exit" => break,
                "new" => {
                    session.reset();
                    println!("Ready for new words.");
                }
                "word" if !arg.is_empty() => match session.register_word(arg) {
                    Ok(dropped) => {
                        if let Some(d) = dropped {
                            println!("Word {d} has no recordings, removing it.");
                        }
                        println!("Add recordings of {arg}.");
                    }
                    Err(e) => println!("{e}"),
                },
                "interpret" => match session.interpret() {
                    Ok(dropped) => {
                        if let Some(d) = dropped {
                            println!("Word {d} has no recordings, removing it.");
                        }
                        warm_transcripts(members(session.groups())).await?;
                        println!("Interpreting with");
                        for g in session.groups() {
                            println!("  {}: {} recordings", g.identifier(), g.len());
                        }
                    }
                    Err(e) => println!("{e}"),
                },
                "add" if !arg.is_empty() => {
                    let recording = match open_recording(Path::new(arg), &factory).await {
                        Ok(r) => r,
                        Err(e) => {
                            println!("{e:#}");
                            continue;
                        }
                    };
                    warm_transcripts([&recording]).await?;
                    match session.submit(recording) {
                        Ok(Submission::Registered { group, size }) => {
                            println!("Added recording {size} of {group}.");
                        }
                        Ok(Submission::Matched(result)) => {
                            match &result.verdict {
                                Verdict::Match { identifier, .. } => println!("Matching '{identifier}'."),
                                Verdict::Indecision => println!("Could not choose a best match."),
                            }
                            if cli.verbose {
                                print_result(&result);
                            }
                        }
                        Err(SessionError::Match(e)) => {
                            warn!(error = %e, "match failed");
                            println!("Could not match: {e}");
                        }
                        Err(e) => println!("{e}"),
                    }
                }
                _ => println!("Unknown instruction: {line}"),
            }
        }
        Ok(())
    }
}
