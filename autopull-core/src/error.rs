//! Error types for autopull-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure with the path that was being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (printing the effective config).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.autopull/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A field holds a value the daemon cannot work with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
