//! Public value types returned by the session manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque session identifier, caller supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One command's prompt, text and output so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleRecord {
    /// Prompt label, e.g. `alice@box:~/src $`
    pub ps1: String,
    /// The command line
    pub command: String,
    /// Output captured since the command started
    #[serde(default)]
    pub output: String,
}

impl ConsoleRecord {
    pub(crate) fn new(ps1: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            ps1: ps1.into(),
            command: command.into(),
            output: String::new(),
        }
    }
}

/// Whether an exec finished inside the grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// The command exited; code and output are included
    Completed,
    /// The command is still running in the background
    Running,
}

/// Result of `exec_command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    /// Session the command ran in
    pub session_id: SessionId,
    /// The command line
    pub command: String,
    /// Completed or still running
    pub status: ExecStatus,
    /// Exit code, only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i32>,
    /// Sanitized output, only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Result of `read_shell_output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    /// Session that was read
    pub session_id: SessionId,
    /// Sanitized output of the current process
    pub output: String,
    /// Sanitized records, empty unless requested
    #[serde(default)]
    pub console_records: Vec<ConsoleRecord>,
}

/// Result of `wait_process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitResult {
    /// Exit code of the process
    pub returncode: i32,
}

/// Result of `write_shell_input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Always `"success"`
    pub status: String,
}

impl WriteResult {
    pub(crate) fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// Outcome of a kill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillStatus {
    /// The process was alive and has been signalled
    Terminated,
    /// The process had already exited
    AlreadyTerminated,
}

/// Result of `kill_process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillResult {
    /// Whether a signal was actually sent
    pub status: KillStatus,
    /// Best effort; `None` when the status was not observable after SIGKILL
    pub returncode: Option<i32>,
}

/// Liveness of a session's current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Exit status not yet known
    Running,
    /// Process has been reaped
    Exited,
}

/// Summary view of a session (for listings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub session_id: SessionId,
    /// Command of the current process
    pub command: String,
    /// Directory of the current process
    pub working_directory: PathBuf,
    /// Liveness of the current process
    pub status: ProcessStatus,
    /// Exit code once exited
    pub returncode: Option<i32>,
    /// Size of the retained cumulative output
    pub output_bytes: usize,
    /// Number of console records
    pub record_count: usize,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last exec, read, write or kill
    pub last_activity: DateTime<Utc>,
}
