//! The process-supervisor collaborator the loop drives.
//!
//! The supervisor owns the process inventory and does the actual pulling,
//! reloading and event delivery. Implementations only translate; every
//! policy decision (timeouts, fail-open, outcome mapping) lives in the loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use autopull_core::{ManagedProcess, ProcessName, VersioningInfo};

use crate::error::SupervisorError;

/// Result of the one-time connection handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Free-form identification reported by the supervisor, if any.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub current_revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulledProcess {
    #[serde(default)]
    pub versioning: Option<VersioningInfo>,
}

/// Metadata returned by a successful pull-and-reload.
///
/// Older supervisors report no revision descriptor at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullMetadata {
    #[serde(default)]
    pub revision: Option<RevisionInfo>,
    #[serde(default)]
    pub processes: Vec<PulledProcess>,
}

/// A pull-and-reload that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResponse {
    /// New code was fetched and the process reloaded.
    Pulled(PullMetadata),
    /// The remote is at the running revision; no reload happened.
    AlreadyCurrent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(rename = "return", default)]
    pub value: Value,
}

/// One structured reply to a custom event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReply {
    pub data: TriggerData,
}

impl TriggerReply {
    pub fn new(value: Value) -> Self {
        Self {
            data: TriggerData { value },
        }
    }
}

#[async_trait]
pub trait Supervisor: Send + Sync {
    /// One-time handshake; the scheduler starts only after this succeeds.
    async fn connect(&self) -> Result<Handshake, SupervisorError>;

    /// Full snapshot of every supervised process, in supervisor order.
    async fn list(&self) -> Result<Vec<ManagedProcess>, SupervisorError>;

    /// Pull the latest revision for `name` and reload it in place.
    async fn pull_and_reload(&self, name: &ProcessName) -> Result<PullResponse, SupervisorError>;

    /// Fire `event` at `name` and collect its replies.
    async fn trigger(
        &self,
        name: &ProcessName,
        event: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<TriggerReply>, SupervisorError>;
}
