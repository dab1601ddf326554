//! Domain types for the autopull reconciliation loop.
//!
//! Everything here is a snapshot or an ephemeral result: the supervisor owns
//! the processes, and the loop only reads them once per cycle.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a supervised process, unique within the supervisor's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessName(pub String);

impl ProcessName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProcessName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProcessName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Process snapshot
// ---------------------------------------------------------------------------

/// Version-control metadata the supervisor attaches to a process.
///
/// Its presence on a [`ManagedProcess`] is what makes the process a candidate
/// for pulling at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersioningInfo {
    pub repo_path: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Read-only snapshot of one supervised process, taken once per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub name: ProcessName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_id: Option<u32>,
    /// Runtime environment; used to discover a readiness-probe port.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub versioning: Option<VersioningInfo>,
    /// The supervisor marks its own add-on modules with this flag.
    #[serde(default)]
    pub is_module: bool,
}

impl ManagedProcess {
    pub fn new(name: impl Into<ProcessName>) -> Self {
        Self {
            name: name.into(),
            pm_id: None,
            env: BTreeMap::new(),
            versioning: None,
            is_module: false,
        }
    }

    pub fn with_versioning(mut self, versioning: VersioningInfo) -> Self {
        self.versioning = Some(versioning);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Per-process results
// ---------------------------------------------------------------------------

/// Normalized answer to "are you safe to update now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    pub ready: bool,
    /// Raw response body or failure description, kept for logging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReadinessVerdict {
    pub fn ready() -> Self {
        Self {
            ready: true,
            detail: None,
        }
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of one pull-and-reload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullOutcome {
    /// A new revision was pulled and the process reloaded. Fields are `None`
    /// when the supervisor did not report a revision descriptor.
    Updated {
        revision: Option<String>,
        repo_path: Option<String>,
        branch: Option<String>,
    },
    /// The remote was already at the running revision; nothing happened.
    AlreadyCurrent,
    Failed { reason: String },
}

/// Why a process was not considered for updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Management-tool process (reserved name prefix or supervisor module).
    Reserved,
    /// No version-control metadata attached.
    Unversioned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Reserved => f.write_str("reserved"),
            SkipReason::Unversioned => f.write_str("unversioned"),
        }
    }
}

/// What happened to one process during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Skipped {
        reason: SkipReason,
    },
    NotReady {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Updated {
        revision: Option<String>,
        repo_path: Option<String>,
        branch: Option<String>,
    },
    AlreadyCurrent,
    Failed {
        reason: String,
    },
}

impl ProcessOutcome {
    /// Short label used in log lines and tables.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Skipped { .. } => "skipped",
            ProcessOutcome::NotReady { .. } => "not-ready",
            ProcessOutcome::Updated { .. } => "updated",
            ProcessOutcome::AlreadyCurrent => "already-current",
            ProcessOutcome::Failed { .. } => "failed",
        }
    }
}

impl From<PullOutcome> for ProcessOutcome {
    fn from(outcome: PullOutcome) -> Self {
        match outcome {
            PullOutcome::Updated {
                revision,
                repo_path,
                branch,
            } => ProcessOutcome::Updated {
                revision,
                repo_path,
                branch,
            },
            PullOutcome::AlreadyCurrent => ProcessOutcome::AlreadyCurrent,
            PullOutcome::Failed { reason } => ProcessOutcome::Failed { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub name: ProcessName,
    #[serde(flatten)]
    pub outcome: ProcessOutcome,
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Ordered per-process outcomes of one scheduler tick, in supervisor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub processes: Vec<ProcessReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub processes: usize,
    pub skipped: usize,
    pub not_ready: usize,
    pub updated: usize,
    pub already_current: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn summary(&self) -> CycleSummary {
        let mut summary = CycleSummary {
            processes: self.processes.len(),
            ..CycleSummary::default()
        };
        for report in &self.processes {
            match report.outcome {
                ProcessOutcome::Skipped { .. } => summary.skipped += 1,
                ProcessOutcome::NotReady { .. } => summary.not_ready += 1,
                ProcessOutcome::Updated { .. } => summary.updated += 1,
                ProcessOutcome::AlreadyCurrent => summary.already_current += 1,
                ProcessOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn outcome_for(&self, name: &str) -> Option<&ProcessOutcome> {
        self.processes
            .iter()
            .find(|report| report.name.as_str() == name)
            .map(|report| &report.outcome)
    }
}
