//! Scriptable in-memory [`Supervisor`] for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use autopull_core::{ManagedProcess, ProcessName, VersioningInfo};

use crate::error::SupervisorError;
use crate::supervisor::{
    Handshake, PullMetadata, PullResponse, PulledProcess, RevisionInfo, Supervisor, TriggerReply,
};

#[derive(Debug, Clone)]
pub(crate) enum PullScript {
    Pulled(PullMetadata),
    AlreadyCurrent,
    Fail(String),
    Hang,
}

#[derive(Debug, Clone)]
pub(crate) enum TriggerScript {
    Replies(Vec<Value>),
    Fail(String),
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Pull(String),
    Trigger(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mark {
    ListStart,
    PullEnd,
}

#[derive(Default)]
pub(crate) struct FakeSupervisor {
    processes: Vec<ManagedProcess>,
    list_error: Option<String>,
    pulls: HashMap<String, PullScript>,
    triggers: HashMap<String, TriggerScript>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    marks: Arc<Mutex<Vec<(Mark, Instant)>>>,
}

impl FakeSupervisor {
    pub(crate) fn new(processes: Vec<ManagedProcess>) -> Self {
        Self {
            processes,
            ..Self::default()
        }
    }

    pub(crate) fn failing_list(message: &str) -> Self {
        Self {
            list_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_pull(mut self, name: &str, script: PullScript) -> Self {
        self.pulls.insert(name.to_string(), script);
        self
    }

    pub(crate) fn with_trigger(mut self, name: &str, script: TriggerScript) -> Self {
        self.triggers.insert(name.to_string(), script);
        self
    }

    /// Every list and pull call sleeps this long before answering.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn pulled(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Pull(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn marks(&self) -> Arc<Mutex<Vec<(Mark, Instant)>>> {
        self.marks.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn mark(&self, mark: Mark) {
        self.marks
            .lock()
            .expect("marks lock")
            .push((mark, Instant::now()));
    }
}

pub(crate) fn versioned(name: &str) -> ManagedProcess {
    ManagedProcess::new(name).with_versioning(VersioningInfo {
        repo_path: format!("/srv/{name}"),
        branch: "main".to_string(),
        revision: None,
        url: None,
    })
}

pub(crate) fn metadata(revision: &str, repo_path: &str, branch: &str) -> PullMetadata {
    PullMetadata {
        revision: Some(RevisionInfo {
            current_revision: revision.to_string(),
        }),
        processes: vec![PulledProcess {
            versioning: Some(VersioningInfo {
                repo_path: repo_path.to_string(),
                branch: branch.to_string(),
                revision: Some(revision.to_string()),
                url: None,
            }),
        }],
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn connect(&self) -> Result<Handshake, SupervisorError> {
        Ok(Handshake {
            detail: Some("fake".to_string()),
        })
    }

    async fn list(&self) -> Result<Vec<ManagedProcess>, SupervisorError> {
        self.record(Call::List);
        self.mark(Mark::ListStart);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.list_error {
            Some(message) => Err(SupervisorError::Unavailable(message.clone())),
            None => Ok(self.processes.clone()),
        }
    }

    async fn pull_and_reload(&self, name: &ProcessName) -> Result<PullResponse, SupervisorError> {
        self.record(Call::Pull(name.0.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = self
            .pulls
            .get(name.as_str())
            .cloned()
            .unwrap_or(PullScript::AlreadyCurrent);
        let result = match script {
            PullScript::Pulled(meta) => Ok(PullResponse::Pulled(meta)),
            PullScript::AlreadyCurrent => Ok(PullResponse::AlreadyCurrent),
            PullScript::Fail(message) => Err(SupervisorError::CommandFailed {
                command: format!("pull {name}"),
                status: "exit status: 1".to_string(),
                stderr: message,
            }),
            PullScript::Hang => std::future::pending().await,
        };
        self.mark(Mark::PullEnd);
        result
    }

    async fn trigger(
        &self,
        name: &ProcessName,
        event: &str,
        _payload: Option<&Value>,
    ) -> Result<Vec<TriggerReply>, SupervisorError> {
        self.record(Call::Trigger(name.0.clone(), event.to_string()));
        let script = self
            .triggers
            .get(name.as_str())
            .cloned()
            .unwrap_or(TriggerScript::Replies(Vec::new()));
        match script {
            TriggerScript::Replies(values) => {
                Ok(values.into_iter().map(TriggerReply::new).collect())
            }
            TriggerScript::Fail(message) => Err(SupervisorError::Unavailable(message)),
            TriggerScript::Hang => std::future::pending().await,
        }
    }
}
