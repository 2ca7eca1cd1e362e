//! speechmatch - match spoken words against labelled recordings.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{EvaluateCommand, GroupsCommand, MatchCommand, SessionCommand, TranscribeCommand};
use config::Config;

/// speechmatch - match spoken words against labelled recordings.
///
/// Recordings are organized as one directory per word:
///
///   words/three/0001.wav
///   words/ten/0001.wav
///
/// Configuration is read from ~/.speechmatch/config.yaml.
#[derive(Parser)]
#[command(name = "speechmatch")]
#[command(about = "Match spoken words against labelled groups of recordings")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.speechmatch/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe one recording
    Transcribe(TranscribeCommand),
    /// List the groups of a recordings directory
    Groups(GroupsCommand),
    /// Match one recording against a recordings directory
    Match(MatchCommand),
    /// Leave-one-out evaluation of one group
    Evaluate(EvaluateCommand),
    /// Interactive register-then-recognize session on stdin
    Session(SessionCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Transcribe(cmd) => cmd.run(&cli, &config).await,
        Commands::Groups(cmd) => cmd.run(&cli, &config).await,
        Commands::Match(cmd) => cmd.run(&cli, &config).await,
        Commands::Evaluate(cmd) => cmd.run(&cli, &config).await,
        Commands::Session(cmd) => cmd.run(&cli, &config).await,
    }
}
