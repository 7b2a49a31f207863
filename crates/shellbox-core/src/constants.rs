//! Defaults for shell session management

// ── Process ────────────────────────────────────────────────────────────────

/// Interpreter used for `<shell> -c <command>`.
pub const DEFAULT_SHELL: &str = "/bin/bash";
/// Appended to written input when enter is pressed.
pub const LINE_ENDING: &str = "\n";

// ── Time Bounds ────────────────────────────────────────────────────────────

/// How long `exec_command` waits before answering "running".
pub const EXEC_GRACE_MS: u64 = 5_000;
/// Grace given to a previous process when a session runs a new command.
pub const REPLACE_GRACE_MS: u64 = 1_000;
/// Grace given to a process on an explicit kill before SIGKILL.
pub const KILL_GRACE_MS: u64 = 3_000;
/// How long to wait for the exit status after SIGKILL.
pub const FORCE_KILL_WAIT_MS: u64 = 1_000;
/// How long a completed exec waits for the pump to drain the pipe.
pub const DRAIN_TIMEOUT_MS: u64 = 500;
/// Wait bound for `wait_process` when none is given.
pub const DEFAULT_WAIT_SECS: u64 = 60;
/// Idle-eviction sweep period.
pub const JANITOR_INTERVAL_SECS: u64 = 60;

// ── Sizes ──────────────────────────────────────────────────────────────────

/// Bytes per read from the output pipe.
pub const READ_CHUNK_SIZE: usize = 4096;

// ── Return Codes ───────────────────────────────────────────────────────────

/// Exit code reported when the OS status could not be collected.
pub const UNKNOWN_EXIT_CODE: i32 = -1;
