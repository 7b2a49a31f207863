//! Shell session configuration

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the session manager.
///
/// Every field has a default so partial TOML tables and environment
/// overrides deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Command interpreter; commands run as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: PathBuf,
    /// Time an exec waits for the command before reporting "running".
    #[serde(default = "default_exec_grace_ms")]
    pub exec_grace_ms: u64,
    /// Grace for the previous process when a session is reused.
    #[serde(default = "default_replace_grace_ms")]
    pub replace_grace_ms: u64,
    /// Grace before SIGKILL on an explicit kill.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// Time to wait for the exit status after SIGKILL.
    #[serde(default = "default_force_kill_wait_ms")]
    pub force_kill_wait_ms: u64,
    /// Time a completed exec waits for buffered output to be drained.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Wait bound used when a caller gives none (or a non-positive one).
    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,
    /// Bytes read from the output pipe per iteration.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Retained output per session and per record. `None` keeps everything.
    #[serde(default)]
    pub max_output_bytes: Option<usize>,
    /// Sessions idle longer than this are evicted by the janitor.
    #[serde(default)]
    pub session_idle_timeout_secs: Option<u64>,
    /// How often the janitor looks for idle sessions.
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
}

fn default_shell() -> PathBuf {
    PathBuf::from(DEFAULT_SHELL)
}
fn default_exec_grace_ms() -> u64 {
    EXEC_GRACE_MS
}
fn default_replace_grace_ms() -> u64 {
    REPLACE_GRACE_MS
}
fn default_kill_grace_ms() -> u64 {
    KILL_GRACE_MS
}
fn default_force_kill_wait_ms() -> u64 {
    FORCE_KILL_WAIT_MS
}
fn default_drain_timeout_ms() -> u64 {
    DRAIN_TIMEOUT_MS
}
fn default_wait_secs() -> u64 {
    DEFAULT_WAIT_SECS
}
fn default_read_chunk_size() -> usize {
    READ_CHUNK_SIZE
}
fn default_janitor_interval_secs() -> u64 {
    JANITOR_INTERVAL_SECS
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            exec_grace_ms: EXEC_GRACE_MS,
            replace_grace_ms: REPLACE_GRACE_MS,
            kill_grace_ms: KILL_GRACE_MS,
            force_kill_wait_ms: FORCE_KILL_WAIT_MS,
            drain_timeout_ms: DRAIN_TIMEOUT_MS,
            default_wait_secs: DEFAULT_WAIT_SECS,
            read_chunk_size: READ_CHUNK_SIZE,
            max_output_bytes: None,
            session_idle_timeout_secs: None,
            janitor_interval_secs: JANITOR_INTERVAL_SECS,
        }
    }
}

impl ShellConfig {
    /// Reject settings the manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.shell.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("shell path is empty".to_string()));
        }
        if self.read_chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.max_output_bytes == Some(0) {
            return Err(Error::InvalidConfig(
                "max_output_bytes must be greater than zero when set".to_string(),
            ));
        }
        if self.janitor_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "janitor_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn exec_grace(&self) -> Duration {
        Duration::from_millis(self.exec_grace_ms)
    }

    pub(crate) fn replace_grace(&self) -> Duration {
        Duration::from_millis(self.replace_grace_ms)
    }

    pub(crate) fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub(crate) fn force_kill_wait(&self) -> Duration {
        Duration::from_millis(self.force_kill_wait_ms)
    }

    pub(crate) fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Bound for `wait_process`: non-positive or missing values fall back
    /// to `default_wait_secs`.
    pub(crate) fn wait_secs(&self, requested: Option<i64>) -> u64 {
        match requested {
            Some(secs) if secs > 0 => secs as u64,
            _ => self.default_wait_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.shell, PathBuf::from("/bin/bash"));
        assert_eq!(config.exec_grace_ms, 5_000);
        assert_eq!(config.kill_grace_ms, 3_000);
        assert_eq!(config.read_chunk_size, 4096);
        assert!(config.max_output_bytes.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize() {
        let config: ShellConfig =
            serde_json::from_str(r#"{"exec_grace_ms": 250, "max_output_bytes": 1024}"#).unwrap();
        assert_eq!(config.exec_grace_ms, 250);
        assert_eq!(config.max_output_bytes, Some(1024));
        assert_eq!(config.default_wait_secs, 60);
    }

    #[test]
    fn test_wait_secs_fallback() {
        let config = ShellConfig::default();
        assert_eq!(config.wait_secs(None), 60);
        assert_eq!(config.wait_secs(Some(0)), 60);
        assert_eq!(config.wait_secs(Some(-5)), 60);
        assert_eq!(config.wait_secs(Some(7)), 7);
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = ShellConfig {
            read_chunk_size: 0,
            ..ShellConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
