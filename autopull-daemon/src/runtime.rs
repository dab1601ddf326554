use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

use autopull_core::{
    AutoPullConfig, CycleReport, ManagedProcess, ProcessName, ReadinessVerdict, SkipReason,
};

use crate::cycle::CycleRunner;
use crate::eligibility;
use crate::error::{io_err, DaemonError, SupervisorError};
use crate::pm2::Pm2Cli;
use crate::scheduler::Scheduler;
use crate::supervisor::{Handshake, Supervisor};

/// Log line format for the long-running loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One row of `autopull list`.
#[derive(Debug, Clone)]
pub struct ProcessListing {
    pub process: ManagedProcess,
    pub skip: Option<SkipReason>,
}

/// Start the loop and block the current thread until it exits.
pub fn start_blocking(config: AutoPullConfig, format: LogFormat) -> Result<(), DaemonError> {
    init_tracing(format);
    block_on(run(config))?
}

/// Connect to pm2 and schedule cycles until Ctrl-C.
pub async fn run(config: AutoPullConfig) -> Result<(), DaemonError> {
    let supervisor = Pm2Cli::from_config(&config);
    run_with(supervisor, config).await
}

/// Connect to `supervisor`, then schedule cycles until Ctrl-C.
pub async fn run_with<S: Supervisor>(
    supervisor: S,
    config: AutoPullConfig,
) -> Result<(), DaemonError> {
    let handshake = connect(&supervisor, &config).await?;
    tracing::info!(
        supervisor = handshake.detail.as_deref().unwrap_or("-"),
        interval_ms = config.effective_interval().as_millis() as u64,
        notify = config.notify,
        "autopull connected to supervisor",
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, stopping after the current cycle");
                    let _ = shutdown.send(());
                    Ok(())
                }
                Err(err) => Err(DaemonError::Runtime(format!(
                    "ctrl-c handler failed: {err}"
                ))),
            }
        })
    };

    let mut scheduler = Scheduler::new(supervisor, &config);
    scheduler.run_until(shutdown_rx).await;

    signal_handle.abort();
    match signal_handle.await {
        Ok(result) => result,
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(DaemonError::Runtime(format!(
            "signal handler join failure: {err}"
        ))),
    }
}

/// Connect and run a single cycle against pm2.
pub fn run_once_blocking(config: &AutoPullConfig) -> Result<CycleReport, DaemonError> {
    init_tracing(LogFormat::Text);
    block_on(async {
        let supervisor = Pm2Cli::from_config(config);
        connect(&supervisor, config).await?;
        CycleRunner::from_config(config).run_cycle(&supervisor).await
    })?
}

/// Run only the readiness prober against one named process.
pub fn check_blocking(
    config: &AutoPullConfig,
    name: &str,
) -> Result<ReadinessVerdict, DaemonError> {
    init_tracing(LogFormat::Text);
    block_on(async {
        let supervisor = Pm2Cli::from_config(config);
        connect(&supervisor, config).await?;
        let process = find_process(&supervisor, config, &ProcessName::from(name)).await?;
        let runner = CycleRunner::from_config(config);
        Ok::<_, DaemonError>(runner.prober().check_ready(&supervisor, &process).await)
    })?
}

/// Snapshot every process together with its eligibility.
pub fn list_blocking(config: &AutoPullConfig) -> Result<Vec<ProcessListing>, DaemonError> {
    init_tracing(LogFormat::Text);
    block_on(async {
        let supervisor = Pm2Cli::from_config(config);
        let processes = list_with_timeout(&supervisor, config.list_timeout()).await?;
        let listings: Vec<ProcessListing> = processes
            .into_iter()
            .map(|process| ProcessListing {
                skip: eligibility::check(&process, &config.reserved_prefix).err(),
                process,
            })
            .collect();
        Ok::<_, DaemonError>(listings)
    })?
}

async fn connect<S: Supervisor + ?Sized>(
    supervisor: &S,
    config: &AutoPullConfig,
) -> Result<Handshake, DaemonError> {
    let limit = config.list_timeout();
    match tokio::time::timeout(limit, supervisor.connect()).await {
        Ok(handshake) => Ok(handshake?),
        Err(_) => Err(timeout("connect", limit).into()),
    }
}

async fn find_process<S: Supervisor + ?Sized>(
    supervisor: &S,
    config: &AutoPullConfig,
    name: &ProcessName,
) -> Result<ManagedProcess, DaemonError> {
    list_with_timeout(supervisor, config.list_timeout())
        .await?
        .into_iter()
        .find(|process| process.name == *name)
        .ok_or_else(|| DaemonError::UnknownProcess(name.0.clone()))
}

async fn list_with_timeout<S: Supervisor + ?Sized>(
    supervisor: &S,
    limit: Duration,
) -> Result<Vec<ManagedProcess>, DaemonError> {
    match tokio::time::timeout(limit, supervisor.list()).await {
        Ok(processes) => Ok(processes?),
        Err(_) => Err(timeout("list", limit).into()),
    }
}

fn timeout(operation: &str, limit: Duration) -> SupervisorError {
    SupervisorError::Timeout {
        operation: operation.to_string(),
        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    Ok(runtime.block_on(future))
}

/// Install the global subscriber on stderr, leaving stdout to command output.
/// `RUST_LOG` overrides the default `info` filter. Later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
    };
}
