//! `autopull config` — show the configuration the loop would run with.

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub source: ConfigSource,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        let yaml = config.to_yaml().context("failed to render config YAML")?;
        print!("{yaml}");
        println!(
            "# effective interval: {} ms",
            config.effective_interval().as_millis()
        );
        Ok(())
    }
}
