//! Pull-and-reload for one process, with its result mapped to a [`PullOutcome`].

use std::time::Duration;

use autopull_core::{AutoPullConfig, ManagedProcess, ProcessName, PullOutcome};

use crate::supervisor::{PullMetadata, PullResponse, Supervisor};

#[derive(Debug, Clone)]
pub struct UpdateExecutor {
    timeout: Duration,
}

impl UpdateExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &AutoPullConfig) -> Self {
        Self::new(config.pull_timeout())
    }

    /// Delegate to the supervisor and classify what came back.
    ///
    /// Waiting is bounded by the configured pull timeout; a collaborator that
    /// never answers costs one `Failed` outcome, not the rest of the cycle.
    pub async fn pull_and_reload<S>(&self, supervisor: &S, process: &ManagedProcess) -> PullOutcome
    where
        S: Supervisor + ?Sized,
    {
        let name = &process.name;
        let pulled = tokio::time::timeout(self.timeout, supervisor.pull_and_reload(name)).await;
        match pulled {
            Err(_) => {
                let reason = format!(
                    "pull-and-reload did not finish within {} ms",
                    self.timeout.as_millis()
                );
                tracing::error!(process = %name, reason = %reason, "pull failed");
                PullOutcome::Failed { reason }
            }
            Ok(Err(err)) => {
                tracing::error!(process = %name, error = %err, "pull failed");
                PullOutcome::Failed {
                    reason: err.to_string(),
                }
            }
            Ok(Ok(PullResponse::AlreadyCurrent)) => {
                tracing::debug!(process = %name, "already at latest version");
                PullOutcome::AlreadyCurrent
            }
            Ok(Ok(PullResponse::Pulled(meta))) => interpret_metadata(name, meta),
        }
    }
}

/// Map successful pull metadata to [`PullOutcome::Updated`].
pub fn interpret_metadata(name: &ProcessName, meta: PullMetadata) -> PullOutcome {
    let Some(revision) = meta.revision else {
        tracing::info!(process = %name, "successfully pulled");
        return PullOutcome::Updated {
            revision: None,
            repo_path: None,
            branch: None,
        };
    };

    let versioning = meta
        .processes
        .into_iter()
        .find_map(|process| process.versioning);
    let repo_path = versioning.as_ref().map(|info| info.repo_path.clone());
    let branch = versioning.map(|info| info.branch);

    tracing::info!(
        process = %name,
        commit = %revision.current_revision,
        repo = repo_path.as_deref().unwrap_or("-"),
        branch = branch.as_deref().unwrap_or("-"),
        "successfully pulled",
    );
    PullOutcome::Updated {
        revision: Some(revision.current_revision),
        repo_path,
        branch,
    }
}
