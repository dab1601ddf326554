//! `autopull list` — supervised processes and their eligibility.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use autopull_daemon::{list_blocking, ProcessListing};

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ListingJson {
    name: String,
    pm_id: Option<u32>,
    managed: bool,
    skip_reason: Option<String>,
    repo_path: Option<String>,
    branch: Option<String>,
    revision: Option<String>,
}

#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "process")]
    process: String,
    #[tabled(rename = "managed")]
    managed: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "revision")]
    revision: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        let listings = list_blocking(&config).context("failed to list supervised processes")?;

        if self.json {
            let payload: Vec<ListingJson> = listings.iter().map(to_json).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize list JSON")?
            );
            return Ok(());
        }

        if listings.is_empty() {
            println!("No processes are supervised.");
            return Ok(());
        }

        let rows: Vec<ListingRow> = listings.iter().map(to_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn to_json(listing: &ProcessListing) -> ListingJson {
    let versioning = listing.process.versioning.as_ref();
    ListingJson {
        name: listing.process.name.to_string(),
        pm_id: listing.process.pm_id,
        managed: listing.skip.is_none(),
        skip_reason: listing.skip.map(|reason| reason.to_string()),
        repo_path: versioning.map(|info| info.repo_path.clone()),
        branch: versioning.map(|info| info.branch.clone()),
        revision: versioning.and_then(|info| info.revision.clone()),
    }
}

fn to_row(listing: &ProcessListing) -> ListingRow {
    let versioning = listing.process.versioning.as_ref();
    let managed = match listing.skip {
        None => "yes".green().to_string(),
        Some(reason) => format!("no ({reason})").bright_black().to_string(),
    };
    ListingRow {
        id: listing
            .process
            .pm_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        process: listing.process.name.to_string(),
        managed,
        branch: versioning
            .map(|info| info.branch.clone())
            .unwrap_or_else(|| "-".to_string()),
        revision: versioning
            .and_then(|info| info.revision.as_deref())
            .map(|revision| revision.chars().take(8).collect())
            .unwrap_or_else(|| "-".to_string()),
    }
}
