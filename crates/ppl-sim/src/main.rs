use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    enumerate::{self, EnumerateArgs},
    score::{self, ScoreArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;
mod models;

#[derive(Parser, Debug)]
#[command(name = "ppl-sim", about = "Discrete enumeration and importance scoring CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate every discrete execution of a built-in model.
    Enumerate(EnumerateArgs),
    /// Build one scored model/guide importance pair.
    Score(ScoreArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Enumerate(args) => enumerate::run(&args),
        Command::Score(args) => score::run(&args),
    }
}
