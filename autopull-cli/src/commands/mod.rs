pub mod check;
pub mod config;
pub mod list;
pub mod once;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use autopull_core::{config as core_config, AutoPullConfig};

/// `--config` shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigSource {
    /// Config file (default: ~/.autopull/config.yaml, optional).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigSource {
    pub fn load(&self) -> Result<AutoPullConfig> {
        match &self.config {
            Some(path) => core_config::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => core_config::load().context("failed to load ~/.autopull/config.yaml"),
        }
    }
}
