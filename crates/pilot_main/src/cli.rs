use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "pilot", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a recorded agent event feed and print the resulting transcript.
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReplayArgs {
    /// JSON lines file with one agent event per line.
    pub feed: PathBuf,

    /// Instruction recorded as the user message that started the run.
    #[arg(long, short = 'i', default_value = "Replay recorded feed")]
    pub instruction: String,

    /// Model the run is attributed to.
    #[arg(long, short = 'm', default_value = "replay")]
    pub model: String,

    /// Output format of the transcript.
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Overrides the configured daily action limit.
    #[arg(long)]
    pub daily_limit: Option<u64>,

    /// Run in an isolated conversation titled as an automated run.
    #[arg(long, default_value_t = false)]
    pub isolated: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Json,
}
