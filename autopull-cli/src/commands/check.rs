//! `autopull check` — run only the readiness prober against one process.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autopull_daemon::check_blocking;

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Supervised process name.
    pub name: String,

    #[command(flatten)]
    pub source: ConfigSource,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        if !config.notify {
            println!(
                "{} readiness gating is off (notify: false); '{}' would be updated unconditionally",
                "!".yellow().bold(),
                self.name
            );
        }

        let verdict = check_blocking(&config, &self.name)
            .with_context(|| format!("readiness check failed for '{}'", self.name))?;

        let status = if verdict.ready {
            "READY".green().bold()
        } else {
            "NOT READY".yellow().bold()
        };
        match verdict.detail {
            Some(detail) => println!("{} {status} ({detail})", self.name),
            None => println!("{} {status}", self.name),
        }
        Ok(())
    }
}
