//! Daemon configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.autopull/
//!   config.yaml   (optional — every field has a default)
//! ```
//!
//! # API pattern
//!
//! - `load_at(home)` — explicit home; a missing file yields defaults
//! - `load()` — derives home from `dirs::home_dir()`, delegates to `load_at`
//! - `load_from(path)` — explicit file; a missing file is an error
//!
//! The loaded value is built once at startup and passed down by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lower bound for the scheduler's sleep between cycles.
pub const MIN_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_NOTIFY_EVENT: &str = "autopull:ready";
pub const DEFAULT_NOTIFY_ENV_PORT: &str = "AUTOPULL_PORT";
pub const DEFAULT_NOTIFY_PATH: &str = "/ready";
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PULL_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_LIST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RESERVED_PREFIX: &str = "pm2-";
pub const DEFAULT_PM2_BIN: &str = "pm2";

/// How a process is asked whether it is safe to update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStrategy {
    /// Round-trip a custom event through the supervisor.
    #[default]
    MessageBus,
    /// GET a JSON endpoint on the process's own loopback port.
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPullConfig {
    /// Milliseconds between cycles; never less than [`MIN_INTERVAL_MS`] in effect.
    pub interval: u64,
    /// Gate reloads on a readiness check.
    pub notify: bool,
    pub notify_strategy: NotifyStrategy,
    pub notify_event: String,
    /// Probe port used when the process environment does not name one.
    pub notify_port: Option<u16>,
    /// Environment variable that overrides the probe port per process.
    pub notify_env_port: Option<String>,
    pub notify_path: String,
    pub notify_timeout: u64,
    pub pull_timeout: u64,
    pub list_timeout: u64,
    pub reserved_prefix: String,
    pub pm2_bin: String,
}

impl Default for AutoPullConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_MS,
            notify: false,
            notify_strategy: NotifyStrategy::default(),
            notify_event: DEFAULT_NOTIFY_EVENT.to_string(),
            notify_port: None,
            notify_env_port: Some(DEFAULT_NOTIFY_ENV_PORT.to_string()),
            notify_path: DEFAULT_NOTIFY_PATH.to_string(),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT_MS,
            pull_timeout: DEFAULT_PULL_TIMEOUT_MS,
            list_timeout: DEFAULT_LIST_TIMEOUT_MS,
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
            pm2_bin: DEFAULT_PM2_BIN.to_string(),
        }
    }
}

impl AutoPullConfig {
    /// Sleep between cycles, floored at one second.
    pub fn effective_interval(&self) -> Duration {
        effective_interval(self.interval)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout)
    }

    /// Normalize and check values that serde alone cannot.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if !self.notify_path.starts_with('/') {
            self.notify_path.insert(0, '/');
        }
        if self.notify_event.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "notify_event",
                reason: "must not be empty".to_string(),
            });
        }
        if self.notify_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "notify_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pull_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "pull_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.list_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "list_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pm2_bin.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pm2_bin",
                reason: "must not be empty".to_string(),
            });
        }
        if self
            .notify_env_port
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            self.notify_env_port = None;
        }
        Ok(self)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// `max(configured, 1000)` milliseconds.
pub fn effective_interval(configured_ms: u64) -> Duration {
    Duration::from_millis(configured_ms.max(MIN_INTERVAL_MS))
}

/// `<home>/.autopull/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".autopull").join("config.yaml")
}

/// Load `<home>/.autopull/config.yaml`, falling back to defaults when absent.
pub fn load_at(home: &Path) -> Result<AutoPullConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return AutoPullConfig::default().validate();
    }
    load_from(&path)
}

/// Load the config from the user's home directory.
pub fn load() -> Result<AutoPullConfig, ConfigError> {
    load_at(&home()?)
}

/// Load an explicitly named config file.
pub fn load_from(path: &Path) -> Result<AutoPullConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&raw, path)
}

fn parse(raw: &str, path: &Path) -> Result<AutoPullConfig, ConfigError> {
    // An empty file deserializes to `()` rather than a mapping.
    if raw.trim().is_empty() {
        return AutoPullConfig::default().validate();
    }
    let config: AutoPullConfig =
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(10, 1000)]
    #[case(0, 1000)]
    #[case(999, 1000)]
    #[case(1000, 1000)]
    #[case(1500, 1500)]
    #[case(30_000, 30_000)]
    fn effective_interval_is_floored(#[case] configured: u64, #[case] expected_ms: u64) {
        assert_eq!(
            effective_interval(configured),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let config = parse("interval: 5000\nnotify: true\n", Path::new("inline.yaml"))
            .expect("parse");
        assert_eq!(config.interval, 5000);
        assert!(config.notify);
        assert_eq!(config.notify_strategy, NotifyStrategy::MessageBus);
        assert_eq!(config.notify_path, DEFAULT_NOTIFY_PATH);
        assert_eq!(config.reserved_prefix, DEFAULT_RESERVED_PREFIX);
    }

    #[test]
    fn notify_path_gets_leading_slash() {
        let config = parse("notify_path: healthz/ready\n", Path::new("inline.yaml"))
            .expect("parse");
        assert_eq!(config.notify_path, "/healthz/ready");
    }

    #[test]
    fn blank_env_port_name_is_dropped() {
        let config = parse("notify_env_port: \"  \"\n", Path::new("inline.yaml")).expect("parse");
        assert_eq!(config.notify_env_port, None);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = parse("notify_timeout: 0\n", Path::new("inline.yaml")).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "notify_timeout", .. }),
            "got: {err}"
        );
    }

    #[test]
    fn zero_list_timeout_is_rejected() {
        let err = parse("list_timeout: 0\n", Path::new("inline.yaml")).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "list_timeout", .. }),
            "got: {err}"
        );

        let config = AutoPullConfig {
            list_timeout: 0,
            ..AutoPullConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("\n", Path::new("inline.yaml")).expect("parse");
        assert_eq!(config, AutoPullConfig::default());
    }
}
