//! Autopull daemon: the update-orchestration loop.
//!
//! Scheduler → cycle runner → {eligibility → readiness → pull-and-reload}
//! per process, driven against a [`Supervisor`].

pub mod cycle;
pub mod eligibility;
mod error;
pub mod executor;
pub mod pm2;
pub mod readiness;
mod runtime;
pub mod scheduler;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::CycleRunner;
pub use error::{DaemonError, SupervisorError};
pub use executor::UpdateExecutor;
pub use pm2::Pm2Cli;
pub use readiness::{ProbeStrategy, Readiness, ReadinessProber};
pub use runtime::{
    check_blocking, init_tracing, list_blocking, run, run_once_blocking, run_with, start_blocking,
    LogFormat, ProcessListing,
};
pub use scheduler::{Scheduler, SchedulerState};
pub use supervisor::{
    Handshake, PullMetadata, PullResponse, PulledProcess, RevisionInfo, Supervisor, TriggerData,
    TriggerReply,
};
