use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a supervisor collaborator.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{operation}` timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("malformed supervisor output: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("supervisor unavailable: {0}")]
    Unavailable(String),
}

/// Error surface for the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("process `{0}` is not known to the supervisor")]
    UnknownProcess(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
