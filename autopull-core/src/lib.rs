//! Autopull core library — domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — process snapshots, readiness verdicts, pull outcomes, cycle reports
//! - [`config`] — [`AutoPullConfig`] and YAML loading
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{AutoPullConfig, NotifyStrategy};
pub use error::ConfigError;
pub use types::{
    CycleReport, CycleSummary, ManagedProcess, ProcessName, ProcessOutcome, ProcessReport,
    PullOutcome, ReadinessVerdict, SkipReason, VersioningInfo,
};
