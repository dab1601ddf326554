//! Fixed-interval driver for the cycle runner.
//!
//! `Idle → Running → Idle → …`. A cycle is always awaited to completion
//! before the sleep starts, and `tick` takes `&mut self`, so two cycles can
//! never run at once.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use autopull_core::{AutoPullConfig, CycleReport};

use crate::cycle::CycleRunner;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

pub struct Scheduler<S> {
    supervisor: S,
    runner: CycleRunner,
    interval: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl<S: Supervisor> Scheduler<S> {
    pub fn new(supervisor: S, config: &AutoPullConfig) -> Self {
        Self::with_runner(
            supervisor,
            CycleRunner::from_config(config),
            config.effective_interval(),
        )
    }

    /// `interval` is floored at one second like the configured value.
    pub fn with_runner(supervisor: S, runner: CycleRunner, interval: Duration) -> Self {
        Self {
            supervisor,
            runner,
            interval: interval.max(autopull_core::config::effective_interval(0)),
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Run exactly one cycle. Cycle-level failures are logged and swallowed.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        let span = tracing::info_span!("cycle", n = self.cycles + 1);
        self.state = SchedulerState::Running;
        let result = self
            .runner
            .run_cycle(&self.supervisor)
            .instrument(span.clone())
            .await;
        self.state = SchedulerState::Idle;
        self.cycles += 1;

        let _entered = span.enter();
        match result {
            Ok(report) => {
                let summary = report.summary();
                tracing::info!(
                    processes = summary.processes,
                    updated = summary.updated,
                    already_current = summary.already_current,
                    not_ready = summary.not_ready,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    duration_ms = report.duration_ms,
                    "auto pull cycle completed",
                );
                Some(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "auto pull check error");
                None
            }
        }
    }

    /// Cycle, sleep, repeat. Shutdown is only observed while sleeping, so a
    /// started cycle always runs to the end.
    pub async fn run_until(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            self.tick().await;
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!(cycles = self.cycles, "scheduler stopped");
    }
}
