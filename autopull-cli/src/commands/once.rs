//! `autopull once` — one update cycle, reported per process.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use autopull_core::{CycleReport, ProcessOutcome};
use autopull_daemon::run_once_blocking;

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "process")]
    process: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl OnceArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        let report = run_once_blocking(&config).context("update cycle failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize cycle JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

fn print_table(report: &CycleReport) {
    let summary = report.summary();
    println!(
        "Autopull v{} | {} processes | {} updated | {} already current | {} not ready | {} failed | {} ms",
        env!("CARGO_PKG_VERSION"),
        summary.processes,
        summary.updated,
        summary.already_current,
        summary.not_ready,
        summary.failed,
        report.duration_ms,
    );

    if report.processes.is_empty() {
        println!("No processes are supervised.");
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .processes
        .iter()
        .map(|row| OutcomeRow {
            process: row.name.to_string(),
            outcome: outcome_label(&row.outcome),
            detail: outcome_detail(&row.outcome),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn outcome_label(outcome: &ProcessOutcome) -> String {
    let label = outcome.label().to_uppercase();
    match outcome {
        ProcessOutcome::Updated { .. } => label.green().bold().to_string(),
        ProcessOutcome::AlreadyCurrent => label.bright_black().to_string(),
        ProcessOutcome::Skipped { .. } => label.bright_black().to_string(),
        ProcessOutcome::NotReady { .. } => label.yellow().bold().to_string(),
        ProcessOutcome::Failed { .. } => label.red().bold().to_string(),
    }
}

fn outcome_detail(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Skipped { reason } => reason.to_string(),
        ProcessOutcome::NotReady { detail } => detail.clone().unwrap_or_default(),
        ProcessOutcome::Updated {
            revision,
            repo_path,
            branch,
        } => match revision {
            Some(revision) => format!(
                "{} on {} ({})",
                revision,
                branch.as_deref().unwrap_or("-"),
                repo_path.as_deref().unwrap_or("-"),
            ),
            None => "revision not reported".to_string(),
        },
        ProcessOutcome::AlreadyCurrent => "up to date".to_string(),
        ProcessOutcome::Failed { reason } => reason.clone(),
    }
}

#[cfg(test)]
mod tests {
    use autopull_core::SkipReason;

    use super::*;

    #[test]
    fn updated_detail_names_revision_branch_and_repo() {
        let detail = outcome_detail(&ProcessOutcome::Updated {
            revision: Some("abc123".into()),
            repo_path: Some("git@x".into()),
            branch: Some("main".into()),
        });
        assert_eq!(detail, "abc123 on main (git@x)");

        let legacy = outcome_detail(&ProcessOutcome::Updated {
            revision: None,
            repo_path: None,
            branch: None,
        });
        assert_eq!(legacy, "revision not reported");
    }

    #[test]
    fn skipped_detail_is_the_reason() {
        let detail = outcome_detail(&ProcessOutcome::Skipped {
            reason: SkipReason::Unversioned,
        });
        assert_eq!(detail, "unversioned");
    }
}
