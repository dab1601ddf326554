//! Asks a process whether it is safe to update right now.
//!
//! Each strategy produces a tri-state [`Readiness`]; [`ReadinessProber::verdict`]
//! is the only place where `Unknown` is turned into "ready" (fail-open). A hung
//! or buggy responder must never wedge the update pipeline.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use autopull_core::{AutoPullConfig, ManagedProcess, NotifyStrategy, ReadinessVerdict};

use crate::supervisor::{Supervisor, TriggerReply};

/// Raw answer of one strategy, before the fail-open policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { body: Option<String> },
    NotReady { body: Option<String> },
    /// No usable answer: transport failure, timeout, missing field.
    Unknown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Readiness gating switched off; every process is ready.
    Disabled,
    MessageBus {
        event: String,
    },
    DirectProbe {
        default_port: Option<u16>,
        env_port: Option<String>,
        path: String,
    },
}

impl ProbeStrategy {
    fn label(&self) -> &'static str {
        match self {
            ProbeStrategy::Disabled => "disabled",
            ProbeStrategy::MessageBus { .. } => "message-bus",
            ProbeStrategy::DirectProbe { .. } => "http",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessProber {
    strategy: ProbeStrategy,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ReadyBody {
    ready: bool,
}

impl ReadinessProber {
    pub fn new(strategy: ProbeStrategy, timeout: Duration) -> Self {
        Self { strategy, timeout }
    }

    pub fn from_config(config: &AutoPullConfig) -> Self {
        let strategy = if !config.notify {
            ProbeStrategy::Disabled
        } else {
            match config.notify_strategy {
                NotifyStrategy::MessageBus => ProbeStrategy::MessageBus {
                    event: config.notify_event.clone(),
                },
                NotifyStrategy::Http => ProbeStrategy::DirectProbe {
                    default_port: config.notify_port,
                    env_port: config.notify_env_port.clone(),
                    path: config.notify_path.clone(),
                },
            }
        };
        Self::new(strategy, config.notify_timeout())
    }

    pub fn strategy(&self) -> &ProbeStrategy {
        &self.strategy
    }

    /// Never fails: every problem becomes a verdict.
    pub async fn check_ready<S>(&self, supervisor: &S, process: &ManagedProcess) -> ReadinessVerdict
    where
        S: Supervisor + ?Sized,
    {
        let readiness = self.probe(supervisor, process).await;
        self.verdict(process, readiness)
    }

    /// Run the configured strategy without applying the fail-open policy.
    pub async fn probe<S>(&self, supervisor: &S, process: &ManagedProcess) -> Readiness
    where
        S: Supervisor + ?Sized,
    {
        match &self.strategy {
            ProbeStrategy::Disabled => Readiness::Ready { body: None },
            ProbeStrategy::MessageBus { event } => {
                self.ask_message_bus(supervisor, process, event).await
            }
            ProbeStrategy::DirectProbe {
                default_port,
                env_port,
                path,
            } => match resolve_port(process, env_port.as_deref(), *default_port) {
                Some(port) => self.ask_http(port, path).await,
                None => Readiness::Unknown {
                    reason: "no probe port resolvable".to_string(),
                },
            },
        }
    }

    /// Fail-open: `Unknown` maps to ready. Bus failures log as warnings,
    /// probe failures as errors.
    pub fn verdict(&self, process: &ManagedProcess, readiness: Readiness) -> ReadinessVerdict {
        match readiness {
            Readiness::Ready { body } => {
                let verdict = ReadinessVerdict::ready();
                match body {
                    Some(body) => verdict.with_detail(body),
                    None => verdict,
                }
            }
            Readiness::NotReady { body } => {
                let verdict = ReadinessVerdict::not_ready();
                match body {
                    Some(body) => verdict.with_detail(body),
                    None => verdict,
                }
            }
            Readiness::Unknown { reason } => {
                match self.strategy {
                    ProbeStrategy::DirectProbe { .. } => tracing::error!(
                        process = %process.name,
                        strategy = self.strategy.label(),
                        reason = %reason,
                        "readiness probe failed, assuming ready",
                    ),
                    _ => tracing::warn!(
                        process = %process.name,
                        strategy = self.strategy.label(),
                        reason = %reason,
                        "no usable readiness reply, assuming ready",
                    ),
                }
                ReadinessVerdict::ready().with_detail(reason)
            }
        }
    }

    async fn ask_message_bus<S>(
        &self,
        supervisor: &S,
        process: &ManagedProcess,
        event: &str,
    ) -> Readiness
    where
        S: Supervisor + ?Sized,
    {
        let round_trip = supervisor.trigger(&process.name, event, None);
        match tokio::time::timeout(self.timeout, round_trip).await {
            Err(_) => Readiness::Unknown {
                reason: format!("no reply to `{event}` within {} ms", self.timeout.as_millis()),
            },
            Ok(Err(err)) => Readiness::Unknown {
                reason: err.to_string(),
            },
            Ok(Ok(replies)) => interpret_bus_reply(replies.first()),
        }
    }

    async fn ask_http(&self, port: u16, path: &str) -> Readiness {
        let url = format!("http://127.0.0.1:{port}{path}");
        let timeout = self.timeout;
        let probe = tokio::task::spawn_blocking(move || fetch_ready(&url, timeout));
        match probe.await {
            Ok(readiness) => readiness,
            Err(err) => Readiness::Unknown {
                reason: format!("probe task join error: {err}"),
            },
        }
    }
}

/// Port from the process's own environment, else the configured default.
pub fn resolve_port(
    process: &ManagedProcess,
    env_port: Option<&str>,
    default_port: Option<u16>,
) -> Option<u16> {
    env_port
        .and_then(|key| process.env_var(key))
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .or(default_port)
}

/// Interpret the first reply of a message-bus round trip.
pub fn interpret_bus_reply(reply: Option<&TriggerReply>) -> Readiness {
    let Some(reply) = reply else {
        return Readiness::Unknown {
            reason: "no reply".to_string(),
        };
    };
    let body = reply.data.value.to_string();
    match reply.data.value.get("ready").and_then(Value::as_bool) {
        Some(true) => Readiness::Ready { body: Some(body) },
        Some(false) => Readiness::NotReady { body: Some(body) },
        None => Readiness::Unknown {
            reason: format!("reply has no boolean `ready` field: {body}"),
        },
    }
}

/// Interpret an HTTP probe body, expected to be `{ "ready": bool }`.
pub fn interpret_probe_body(body: &str) -> Readiness {
    match serde_json::from_str::<ReadyBody>(body) {
        Ok(ReadyBody { ready: true }) => Readiness::Ready {
            body: Some(body.to_string()),
        },
        Ok(ReadyBody { ready: false }) => Readiness::NotReady {
            body: Some(body.to_string()),
        },
        Err(err) => Readiness::Unknown {
            reason: format!("unexpected probe response ({err}): {body}"),
        },
    }
}

fn fetch_ready(url: &str, timeout: Duration) -> Readiness {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        // A 503 carrying `{"ready": false}` is still an answer.
        Err(ureq::Error::Status(_, response)) => response,
        Err(err) => {
            return Readiness::Unknown {
                reason: format!("GET {url}: {err}"),
            }
        }
    };
    match response.into_string() {
        Ok(body) => interpret_probe_body(&body),
        Err(err) => Readiness::Unknown {
            reason: format!("GET {url}: reading body: {err}"),
        },
    }
}
