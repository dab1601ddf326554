//! One full pass over every supervised process.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use autopull_core::{
    AutoPullConfig, CycleReport, ManagedProcess, ProcessOutcome, ProcessReport,
};

use crate::eligibility;
use crate::error::{DaemonError, SupervisorError};
use crate::executor::UpdateExecutor;
use crate::readiness::ReadinessProber;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone)]
pub struct CycleRunner {
    reserved_prefix: String,
    list_timeout: Duration,
    prober: ReadinessProber,
    executor: UpdateExecutor,
}

impl CycleRunner {
    pub fn new(
        reserved_prefix: impl Into<String>,
        list_timeout: Duration,
        prober: ReadinessProber,
        executor: UpdateExecutor,
    ) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
            list_timeout,
            prober,
            executor,
        }
    }

    pub fn from_config(config: &AutoPullConfig) -> Self {
        Self::new(
            config.reserved_prefix.clone(),
            config.list_timeout(),
            ReadinessProber::from_config(config),
            UpdateExecutor::from_config(config),
        )
    }

    pub fn prober(&self) -> &ReadinessProber {
        &self.prober
    }

    pub fn reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }

    /// List, then handle each process strictly one after another in
    /// supervisor order. Only a failed listing aborts the cycle.
    pub async fn run_cycle<S>(&self, supervisor: &S) -> Result<CycleReport, DaemonError>
    where
        S: Supervisor + ?Sized,
    {
        let started_at = Utc::now();
        let started = Instant::now();

        let processes = self.list(supervisor).await?;
        let mut reports = Vec::with_capacity(processes.len());
        for process in processes {
            let outcome = self.handle_process(supervisor, &process).await;
            reports.push(ProcessReport {
                name: process.name,
                outcome,
            });
        }

        Ok(CycleReport {
            started_at,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            processes: reports,
        })
    }

    /// Eligibility → readiness → pull-and-reload for a single process.
    ///
    /// Prober and executor turn every failure into a value, so one process
    /// can never abort the ones after it.
    pub async fn handle_process<S>(
        &self,
        supervisor: &S,
        process: &ManagedProcess,
    ) -> ProcessOutcome
    where
        S: Supervisor + ?Sized,
    {
        if let Err(reason) = eligibility::check(process, &self.reserved_prefix) {
            tracing::debug!(process = %process.name, reason = %reason, "skipping process");
            return ProcessOutcome::Skipped { reason };
        }

        tracing::debug!(process = %process.name, "check, pull and reload");

        let verdict = self.prober.check_ready(supervisor, process).await;
        if !verdict.ready {
            tracing::info!(
                process = %process.name,
                detail = verdict.detail.as_deref().unwrap_or(""),
                "process not ready, skipping update",
            );
            return ProcessOutcome::NotReady {
                detail: verdict.detail,
            };
        }

        self.executor.pull_and_reload(supervisor, process).await.into()
    }

    async fn list<S>(&self, supervisor: &S) -> Result<Vec<ManagedProcess>, DaemonError>
    where
        S: Supervisor + ?Sized,
    {
        match tokio::time::timeout(self.list_timeout, supervisor.list()).await {
            Ok(listed) => Ok(listed?),
            Err(_) => Err(SupervisorError::Timeout {
                operation: "list".to_string(),
                after_ms: u64::try_from(self.list_timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use autopull_core::{ProcessName, SkipReason};

    use super::*;
    use crate::readiness::ProbeStrategy;
    use crate::testing::{metadata, versioned, Call, FakeSupervisor, PullScript, TriggerScript};

    fn runner(strategy: ProbeStrategy) -> CycleRunner {
        CycleRunner::new(
            "pm2-",
            Duration::from_secs(5),
            ReadinessProber::new(strategy, Duration::from_millis(200)),
            UpdateExecutor::new(Duration::from_secs(5)),
        )
    }

    fn bus() -> ProbeStrategy {
        ProbeStrategy::MessageBus {
            event: "autopull:ready".to_string(),
        }
    }

    #[tokio::test]
    async fn unversioned_process_is_never_pulled() {
        let supervisor = FakeSupervisor::new(vec![ManagedProcess::new("api")]);
        let report = runner(ProbeStrategy::Disabled)
            .run_cycle(&supervisor)
            .await
            .expect("cycle");
        assert_eq!(
            report.outcome_for("api"),
            Some(&ProcessOutcome::Skipped {
                reason: SkipReason::Unversioned
            })
        );
        assert!(supervisor.pulled().is_empty());
    }

    #[tokio::test]
    async fn reserved_process_is_never_probed_or_pulled() {
        let supervisor = FakeSupervisor::new(vec![versioned("pm2-auto-pull-worker")]);
        let report = runner(bus()).run_cycle(&supervisor).await.expect("cycle");
        assert_eq!(
            report.outcome_for("pm2-auto-pull-worker"),
            Some(&ProcessOutcome::Skipped {
                reason: SkipReason::Reserved
            })
        );
        assert_eq!(supervisor.calls(), vec![Call::List]);
    }

    #[tokio::test]
    async fn notify_disabled_pulls_directly() {
        let supervisor = FakeSupervisor::new(vec![versioned("worker")]).with_pull(
            "worker",
            PullScript::Pulled(metadata("abc123", "git@x", "main")),
        );
        let report = runner(ProbeStrategy::Disabled)
            .run_cycle(&supervisor)
            .await
            .expect("cycle");
        assert_eq!(
            report.outcome_for("worker"),
            Some(&ProcessOutcome::Updated {
                revision: Some("abc123".into()),
                repo_path: Some("git@x".into()),
                branch: Some("main".into()),
            })
        );
        assert_eq!(
            supervisor.calls(),
            vec![Call::List, Call::Pull("worker".into())]
        );
    }

    #[tokio::test]
    async fn not_ready_process_is_skipped_without_pull() {
        let supervisor = FakeSupervisor::new(vec![versioned("web2")]).with_trigger(
            "web2",
            TriggerScript::Replies(vec![json!({"ready": false})]),
        );
        let report = runner(bus()).run_cycle(&supervisor).await.expect("cycle");
        assert!(matches!(
            report.outcome_for("web2"),
            Some(ProcessOutcome::NotReady { .. })
        ));
        assert!(supervisor.pulled().is_empty());
    }

    #[tokio::test]
    async fn unresponsive_bus_fails_open_and_pulls() {
        let supervisor = FakeSupervisor::new(vec![versioned("web")])
            .with_trigger("web", TriggerScript::Hang)
            .with_pull("web", PullScript::AlreadyCurrent);
        let report = runner(bus()).run_cycle(&supervisor).await.expect("cycle");
        assert_eq!(report.outcome_for("web"), Some(&ProcessOutcome::AlreadyCurrent));
        assert_eq!(supervisor.pulled(), ["web"]);
    }

    #[tokio::test]
    async fn unreachable_http_probe_fails_open_and_pulls() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let supervisor = FakeSupervisor::new(vec![versioned("web")]).with_pull(
            "web",
            PullScript::Pulled(metadata("d00d", "/srv/web", "main")),
        );
        let strategy = ProbeStrategy::DirectProbe {
            default_port: Some(port),
            env_port: None,
            path: "/ready".to_string(),
        };

        let report = runner(strategy).run_cycle(&supervisor).await.expect("cycle");

        assert_eq!(supervisor.pulled(), ["web"]);
        assert!(matches!(
            report.outcome_for("web"),
            Some(ProcessOutcome::Updated { .. })
        ));
    }

    #[tokio::test]
    async fn failure_on_one_process_does_not_stop_the_rest() {
        let supervisor = FakeSupervisor::new(vec![
            versioned("alpha"),
            versioned("bravo"),
            versioned("charlie"),
            versioned("delta"),
        ])
        .with_trigger("alpha", TriggerScript::Fail("bus down".into()))
        .with_pull("bravo", PullScript::Fail("remote hung up".into()))
        .with_pull(
            "charlie",
            PullScript::Pulled(metadata("c0ffee", "/srv/charlie", "main")),
        );

        let report = runner(bus()).run_cycle(&supervisor).await.expect("cycle");

        assert_eq!(supervisor.pulled(), ["alpha", "bravo", "charlie", "delta"]);
        assert!(matches!(
            report.outcome_for("bravo"),
            Some(ProcessOutcome::Failed { .. })
        ));
        assert!(matches!(
            report.outcome_for("charlie"),
            Some(ProcessOutcome::Updated { .. })
        ));
        assert_eq!(report.outcome_for("delta"), Some(&ProcessOutcome::AlreadyCurrent));
    }

    #[tokio::test]
    async fn outcomes_follow_supervisor_order() {
        let supervisor = FakeSupervisor::new(vec![
            versioned("zeta"),
            ManagedProcess::new("alpha"),
            versioned("mid"),
        ]);
        let report = runner(ProbeStrategy::Disabled)
            .run_cycle(&supervisor)
            .await
            .expect("cycle");
        let names: Vec<ProcessName> = report.processes.into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                ProcessName::from("zeta"),
                ProcessName::from("alpha"),
                ProcessName::from("mid")
            ]
        );
    }

    #[tokio::test]
    async fn list_failure_aborts_the_cycle() {
        let supervisor = FakeSupervisor::failing_list("connection reset");
        let err = runner(ProbeStrategy::Disabled)
            .run_cycle(&supervisor)
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::Supervisor(_)), "got: {err}");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_list_is_bounded() {
        let supervisor = FakeSupervisor::new(vec![versioned("worker")])
            .with_delay(Duration::from_secs(60));
        let err = runner(ProbeStrategy::Disabled)
            .run_cycle(&supervisor)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                DaemonError::Supervisor(SupervisorError::Timeout { .. })
            ),
            "got: {err}"
        );
    }
}
