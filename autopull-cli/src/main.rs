//! Autopull — keeps pm2-managed apps at the head of their branch.
//!
//! # Usage
//!
//! ```text
//! autopull run [--config <path>] [--interval <ms>] [--json-logs]
//! autopull once [--config <path>] [--json]
//! autopull check <name> [--config <path>]
//! autopull list [--config <path>] [--json]
//! autopull config [--config <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, config::ConfigArgs, list::ListArgs, once::OnceArgs, run::RunArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "autopull",
    version,
    about = "Pull and reload supervised apps when they say it is safe",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to pm2 and update processes on a fixed interval until Ctrl-C.
    Run(RunArgs),

    /// Run a single update cycle and print what happened to each process.
    Once(OnceArgs),

    /// Ask one process whether it is ready to be updated.
    Check(CheckArgs),

    /// List supervised processes and whether autopull manages them.
    List(ListArgs),

    /// Print the effective configuration.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Once(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
