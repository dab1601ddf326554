//! [`Supervisor`] backed by the pm2 command line.
//!
//! | operation         | command                               |
//! |-------------------|---------------------------------------|
//! | `connect`         | `pm2 ping`                            |
//! | `list`            | `pm2 jlist`                           |
//! | `pull_and_reload` | `pm2 pull <name>` then `pm2 jlist`    |
//! | `trigger`         | `pm2 trigger <name> <event> [payload]`|
//!
//! Children are killed when their future is dropped, so the loop's own
//! timeouts also reap the CLI client.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use autopull_core::{AutoPullConfig, ManagedProcess, ProcessName, VersioningInfo};

use crate::error::SupervisorError;
use crate::supervisor::{
    Handshake, PullMetadata, PullResponse, PulledProcess, RevisionInfo, Supervisor, TriggerReply,
};

/// Output fragments pm2 and git print when the remote has nothing new.
const ALREADY_CURRENT_MARKERS: &[&str] = &[
    "already up-to-date",
    "already up to date",
    "already at latest",
    "already at the latest",
];

#[derive(Debug, Clone)]
pub struct Pm2Cli {
    bin: String,
}

struct CommandOutput {
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

impl Pm2Cli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_config(config: &AutoPullConfig) -> Self {
        Self::new(config.pm2_bin.clone())
    }

    async fn exec(&self, args: &[&str]) -> Result<CommandOutput, SupervisorError> {
        let command = format!("{} {}", self.bin, args.join(" "));
        tracing::trace!(command = %command, "running supervisor command");

        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SupervisorError::Spawn {
                command: command.clone(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn exec_checked(&self, args: &[&str]) -> Result<CommandOutput, SupervisorError> {
        let output = self.exec(args).await?;
        if !output.success {
            return Err(failed(&self.bin, args, &output));
        }
        Ok(output)
    }
}

#[async_trait]
impl Supervisor for Pm2Cli {
    async fn connect(&self) -> Result<Handshake, SupervisorError> {
        let output = self
            .exec(&["ping"])
            .await
            .map_err(|err| SupervisorError::Unavailable(err.to_string()))?;
        if !output.success {
            let err = failed(&self.bin, &["ping"], &output);
            return Err(SupervisorError::Unavailable(err.to_string()));
        }
        let detail = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string);
        Ok(Handshake { detail })
    }

    async fn list(&self) -> Result<Vec<ManagedProcess>, SupervisorError> {
        let output = self.exec_checked(&["jlist"]).await?;
        parse_jlist(&output.stdout)
    }

    async fn pull_and_reload(&self, name: &ProcessName) -> Result<PullResponse, SupervisorError> {
        let args = ["pull", name.as_str()];
        let output = self.exec(&args).await?;
        if is_already_current(&output.combined()) {
            return Ok(PullResponse::AlreadyCurrent);
        }
        if !output.success {
            return Err(failed(&self.bin, &args, &output));
        }

        // `pm2 pull` prints prose only; the revision comes from a fresh snapshot.
        let versioning = match self.list().await {
            Ok(processes) => processes
                .into_iter()
                .find(|process| process.name == *name)
                .and_then(|process| process.versioning),
            Err(err) => {
                tracing::warn!(
                    process = %name,
                    error = %err,
                    "pulled, but could not read back the new revision",
                );
                None
            }
        };
        Ok(PullResponse::Pulled(pull_metadata(versioning)))
    }

    async fn trigger(
        &self,
        name: &ProcessName,
        event: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<TriggerReply>, SupervisorError> {
        let payload = payload.map(Value::to_string);
        let mut args = vec!["trigger", name.as_str(), event];
        if let Some(payload) = payload.as_deref() {
            args.push(payload);
        }
        let output = self.exec_checked(&args).await?;
        Ok(parse_trigger_replies(&output.stdout))
    }
}

fn failed(bin: &str, args: &[&str], output: &CommandOutput) -> SupervisorError {
    let stderr = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    SupervisorError::CommandFailed {
        command: format!("{bin} {}", args.join(" ")),
        status: output.status.clone(),
        stderr,
    }
}

/// The single place where "nothing to pull" is told apart from a real failure.
pub fn is_already_current(output: &str) -> bool {
    let lowered = output.to_ascii_lowercase();
    ALREADY_CURRENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn pull_metadata(versioning: Option<VersioningInfo>) -> PullMetadata {
    let revision = versioning
        .as_ref()
        .and_then(|info| info.revision.clone())
        .map(|current_revision| RevisionInfo { current_revision });
    PullMetadata {
        revision,
        processes: vec![PulledProcess { versioning }],
    }
}

// ---------------------------------------------------------------------------
// jlist parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    #[serde(default)]
    pm_id: Option<u32>,
    #[serde(default)]
    pm2_env: Option<JlistEnv>,
}

#[derive(Debug, Default, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    env: BTreeMap<String, Value>,
    #[serde(default)]
    versioning: Option<JlistVersioning>,
    #[serde(default)]
    pmx_module: Value,
}

#[derive(Debug, Deserialize)]
struct JlistVersioning {
    #[serde(default)]
    repo_path: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Parse `pm2 jlist` output, tolerating log lines printed before the JSON.
pub fn parse_jlist(stdout: &str) -> Result<Vec<ManagedProcess>, SupervisorError> {
    let json = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("[{") || *line == "[]")
        .ok_or_else(|| {
            SupervisorError::Malformed("no process list in `jlist` output".to_string())
        })?;

    let entries: Vec<JlistEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(into_process).collect())
}

fn into_process(entry: JlistEntry) -> ManagedProcess {
    let pm2_env = entry.pm2_env.unwrap_or_default();
    let env = pm2_env
        .env
        .into_iter()
        .filter_map(|(key, value)| env_string(value).map(|value| (key, value)))
        .collect();
    let versioning = pm2_env.versioning.map(|info| VersioningInfo {
        repo_path: info.repo_path.unwrap_or_default(),
        branch: info.branch.unwrap_or_default(),
        revision: info.revision,
        url: info.url,
    });
    let is_module = match pm2_env.pmx_module {
        Value::Bool(flag) => flag,
        Value::String(flag) => flag == "true",
        _ => false,
    };

    ManagedProcess {
        name: ProcessName::from(entry.name),
        pm_id: entry.pm_id,
        env,
        versioning,
        is_module,
    }
}

fn env_string(value: Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// trigger parsing
// ---------------------------------------------------------------------------

/// Every stdout line carrying a JSON object becomes one reply. Lines already
/// shaped like `{ "data": { "return": … } }` are unwrapped.
pub fn parse_trigger_replies(stdout: &str) -> Vec<TriggerReply> {
    stdout
        .lines()
        .filter_map(|line| {
            let start = line.find('{')?;
            let value: Value = serde_json::from_str(line[start..].trim()).ok()?;
            if !value.is_object() {
                return None;
            }
            match serde_json::from_value::<TriggerReply>(value.clone()) {
                Ok(reply) if value.get("data").is_some_and(|data| data.get("return").is_some()) => {
                    Some(reply)
                }
                _ => Some(TriggerReply::new(value)),
            }
        })
        .collect()
}
