//! `autopull run` — the long-running update loop.

use anyhow::{Context, Result};
use clap::Args;

use autopull_daemon::{start_blocking, LogFormat};

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Override the interval between cycles, in milliseconds (floor 1000).
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub json_logs: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let mut config = self.source.load()?;
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        let format = if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        start_blocking(config, format).context("autopull exited with error")
    }
}
