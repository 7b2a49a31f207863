//! Session manager
//!
//! Public entry point of the crate. Every operation takes a [`SessionId`];
//! an exec on an unknown id creates the session, an exec on a known id
//! replaces its process. All other operations require an existing session.
//!
//! Execs on the same id are serialized through a per-id lock kept in the
//! [`SessionRegistry`]; execs on different ids run concurrently.


use crate::config::ShellConfig;
use crate::constants::LINE_ENDING;
use crate::error::{Error, Result};
use crate::process::{ExitStatusLost, OutputStream, ShellProcess};
use crate::prompt::format_prompt;
use crate::pump::PumpHandle;
use crate::registry::SessionRegistry;
use crate::sanitize::strip_ansi_escapes;
use crate::session::Session;
use crate::types::{
    ConsoleRecord, ExecResult, ExecStatus, KillResult, KillStatus, ReadResult, SessionId,
    SessionSummary, WaitResult, WriteResult,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Manages interactive shell sessions.
pub struct SessionManager {
    config: ShellConfig,
    registry: Arc<SessionRegistry>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create a manager with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ShellConfig::default(),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Create a manager with a custom configuration.
    ///
    /// Fails with [`Error::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn with_config(config: ShellConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(SessionRegistry::new()))
    }

    /// Create a manager over an existing registry.
    pub fn with_registry(config: ShellConfig, registry: Arc<SessionRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    /// Active configuration.
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Registry holding the live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Generate a fresh session id. Nothing is registered until the first
    /// exec under it.
    pub fn create_session_id(&self) -> SessionId {
        let id = SessionId::generate();
        info!(session_id = %id, "Created shell session id");
        id
    }

    /// Run `command` in the session, creating it if needed.
    ///
    /// Waits up to `exec_grace_ms` for the command. If it finishes in time the
    /// result is `completed` with the return code and the sanitized output,
    /// otherwise `running`.
    pub async fn exec_command(
        &self,
        session_id: &SessionId,
        working_directory: Option<&Path>,
        command: &str,
    ) -> Result<ExecResult> {
        let working_dir = resolve_working_dir(working_directory).await?;

        let _lock = self.registry.lock_exec(session_id).await;
        self.exec_locked(session_id, &working_dir, command).await
    }

    /// Sanitized output of the session's current process, plus the sanitized
    /// console records when `include_console_records` is set.
    pub async fn read_shell_output(
        &self,
        session_id: &SessionId,
        include_console_records: bool,
    ) -> Result<ReadResult> {
        let session = self.session(session_id).await?;
        session.touch();
        let console_records = if include_console_records {
            session.clean_records()
        } else {
            Vec::new()
        };
        Ok(ReadResult {
            session_id: session_id.clone(),
            output: strip_ansi_escapes(&session.output()),
            console_records,
        })
    }

    /// Sanitized console records of the session.
    pub async fn get_console_records(&self, session_id: &SessionId) -> Result<Vec<ConsoleRecord>> {
        let session = self.session(session_id).await?;
        session.touch();
        Ok(session.clean_records())
    }

    /// Wait for the session's current process to exit.
    ///
    /// `seconds` missing or not positive means `default_wait_secs`. On timeout
    /// the process keeps running.
    pub async fn wait_process(
        &self,
        session_id: &SessionId,
        seconds: Option<i64>,
    ) -> Result<WaitResult> {
        let session = self.session(session_id).await?;
        let secs = self.config.wait_secs(seconds);
        let process = session.process();

        match process.wait_exit(Duration::from_secs(secs)).await {
            Ok(Some(returncode)) => {
                self.await_drain(session_id, &process).await;
                session.touch();
                Ok(WaitResult { returncode })
            }
            Ok(None) => {
                debug!(session_id = %session_id, secs, "Wait timed out");
                Err(Error::Timeout { secs })
            }
            Err(ExitStatusLost) => {
                error!(session_id = %session_id, "Exit status of process was lost");
                Err(Error::internal(format!(
                    "exit status lost for session {}",
                    session_id
                )))
            }
        }
    }

    /// Send `input_text` (plus a newline when `press_enter`) to the process.
    ///
    /// The text is also mirrored into the session output, like typed input on
    /// a terminal.
    pub async fn write_shell_input(
        &self,
        session_id: &SessionId,
        input_text: &str,
        press_enter: bool,
    ) -> Result<WriteResult> {
        let session = self.session(session_id).await?;
        let process = session.process();
        if !process.is_running() {
            return Err(Error::ProcessExited(session_id.clone()));
        }

        let mut text = input_text.to_string();
        if press_enter {
            text.push_str(LINE_ENDING);
        }
        session.echo_input(&text);

        process
            .write_stdin(text.as_bytes())
            .await
            .map_err(|source| {
                error!(session_id = %session_id, error = %source, "Failed to write to process stdin");
                Error::Io {
                    session_id: session_id.clone(),
                    source,
                }
            })?;
        debug!(session_id = %session_id, bytes = text.len(), "Wrote input to process");
        Ok(WriteResult::success())
    }

    /// Terminate the session's process group. Idempotent once it has exited.
    pub async fn kill_process(&self, session_id: &SessionId) -> Result<KillResult> {
        let session = self.session(session_id).await?;
        session.touch();
        Ok(self.terminate_session(&session).await)
    }

    /// Summaries of all live sessions, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .registry
            .all()
            .await
            .iter()
            .map(|session| session.summary())
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        summaries
    }

    /// Kill the session's process and forget the session.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<KillResult> {
        let _lock = self.registry.lock_exec(session_id).await;
        self.close_locked(session_id).await
    }

    /// Close every session idle for longer than `max_idle`.
    ///
    /// Returns the ids that were evicted.
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> Vec<SessionId> {
        let now = Utc::now();
        let stale: Vec<SessionId> = self
            .registry
            .all()
            .await
            .iter()
            .filter(|session| {
                (now - session.last_activity())
                    .to_std()
                    .is_ok_and(|idle| idle > max_idle)
            })
            .map(|session| session.id().clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for id in stale {
            match self.close_session(&id).await {
                Ok(_) => {
                    info!(session_id = %id, "Evicted idle shell session");
                    evicted.push(id);
                }
                // Closed concurrently
                Err(Error::SessionNotFound(_)) => {}
                Err(e) => warn!(session_id = %id, error = %e, "Failed to evict idle session"),
            }
        }
        evicted
    }

    /// Start the idle-eviction task.
    ///
    /// Returns `None` when `session_idle_timeout_secs` is unset. The task runs
    /// until `cancel` fires.
    pub fn spawn_janitor(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let max_idle = Duration::from_secs(self.config.session_idle_timeout_secs?);
        let period = Duration::from_secs(self.config.janitor_interval_secs);
        let manager = Arc::clone(self);

        Some(tokio::spawn(async move {
            info!(
                max_idle_secs = max_idle.as_secs(),
                interval_secs = period.as_secs(),
                "Session janitor started"
            );
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = manager.evict_idle_sessions(max_idle).await;
                        if !evicted.is_empty() {
                            debug!(count = evicted.len(), "Janitor pass evicted sessions");
                        }
                    }
                }
            }
            info!("Session janitor stopped");
        }))
    }

    /// Close every session.
    pub async fn shutdown(&self) {
        let ids = self.registry.ids().await;
        info!(count = ids.len(), "Shutting down shell sessions");
        for id in ids {
            if let Err(e) = self.close_session(&id).await {
                debug!(session_id = %id, error = %e, "Session already gone at shutdown");
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn session(&self, session_id: &SessionId) -> Result<Arc<Session>> {
        self.registry
            .get(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.clone()))
    }

    async fn exec_locked(
        &self,
        session_id: &SessionId,
        working_dir: &Path,
        command: &str,
    ) -> Result<ExecResult> {
        let record = ConsoleRecord::new(format_prompt(working_dir), command);

        let (session, process) = match self.registry.get(session_id).await {
            None => {
                let (process, output) = self.spawn(session_id, command, working_dir)?;
                let process = Arc::new(process);
                let session = Session::new(
                    session_id.clone(),
                    working_dir.to_path_buf(),
                    record,
                    Arc::clone(&process),
                    self.config.max_output_bytes,
                );
                self.start_pump(&session, session.generation(), &process, output);
                self.registry.insert(Arc::clone(&session)).await;
                info!(
                    session_id = %session_id,
                    pid = ?process.pid(),
                    cwd = %working_dir.display(),
                    "Started shell session"
                );
                (session, process)
            }
            Some(session) => {
                self.retire_process(session_id, &session.process()).await;

                let (process, output) = match self.spawn(session_id, command, working_dir) {
                    Ok(spawned) => spawned,
                    Err(e) => {
                        self.registry.remove(session_id).await;
                        warn!(session_id = %session_id, "Removed session after failed respawn");
                        return Err(e);
                    }
                };
                let process = Arc::new(process);
                let generation =
                    session.replace_process(working_dir, record, Arc::clone(&process));
                self.start_pump(&session, generation, &process, output);
                info!(
                    session_id = %session_id,
                    pid = ?process.pid(),
                    generation,
                    "Replaced session process"
                );
                (session, process)
            }
        };

        match process.wait_exit(self.config.exec_grace()).await {
            Ok(Some(returncode)) => {
                self.await_drain(session_id, &process).await;
                debug!(session_id = %session_id, returncode, "Command completed within grace period");
                Ok(ExecResult {
                    session_id: session_id.clone(),
                    command: command.to_string(),
                    status: ExecStatus::Completed,
                    returncode: Some(returncode),
                    output: Some(strip_ansi_escapes(&session.output())),
                })
            }
            Ok(None) => {
                debug!(session_id = %session_id, "Command still running after grace period");
                Ok(ExecResult {
                    session_id: session_id.clone(),
                    command: command.to_string(),
                    status: ExecStatus::Running,
                    returncode: None,
                    output: None,
                })
            }
            Err(ExitStatusLost) => {
                error!(session_id = %session_id, command = %command, "Exit status of process was lost");
                Err(Error::internal(format!(
                    "exit status lost for session {}",
                    session_id
                )))
            }
        }
    }

    async fn close_locked(&self, session_id: &SessionId) -> Result<KillResult> {
        let session = self.session(session_id).await?;
        let result = self.terminate_session(&session).await;
        session.process().stop_pump();
        self.registry.remove(session_id).await;
        info!(session_id = %session_id, status = ?result.status, "Closed shell session");
        Ok(result)
    }

    async fn terminate_session(&self, session: &Session) -> KillResult {
        let process = session.process();
        if let Some(code) = process.exit_code() {
            return KillResult {
                status: KillStatus::AlreadyTerminated,
                returncode: Some(code),
            };
        }
        let returncode = process
            .terminate(self.config.kill_grace(), self.config.force_kill_wait())
            .await;
        info!(session_id = %session.id(), returncode = ?returncode, "Killed shell process");
        KillResult {
            status: KillStatus::Terminated,
            returncode,
        }
    }

    /// Stop the previous process of a session before it is replaced.
    async fn retire_process(&self, session_id: &SessionId, process: &ShellProcess) {
        if process.is_running() {
            debug!(session_id = %session_id, pid = ?process.pid(), "Terminating previous process");
            process
                .terminate(self.config.replace_grace(), self.config.force_kill_wait())
                .await;
        }
        // Output still in the pipe belongs to the old record.
        if !process.wait_drained(self.config.drain_timeout()).await {
            debug!(session_id = %session_id, "Previous output pump did not drain in time");
        }
        process.stop_pump();
    }

    fn spawn(
        &self,
        session_id: &SessionId,
        command: &str,
        working_dir: &Path,
    ) -> Result<(ShellProcess, OutputStream)> {
        ShellProcess::spawn(&self.config.shell, command, working_dir).map_err(|source| {
            error!(
                session_id = %session_id,
                command = %command,
                error = %source,
                "Failed to spawn shell process"
            );
            Error::Spawn {
                session_id: session_id.clone(),
                command: command.to_string(),
                source,
            }
        })
    }

    fn start_pump(
        &self,
        session: &Arc<Session>,
        generation: u64,
        process: &ShellProcess,
        output: OutputStream,
    ) {
        let pump = PumpHandle::start(
            session.id().clone(),
            Arc::downgrade(session),
            generation,
            output,
            self.config.read_chunk_size,
        );
        process.attach_pump(pump);
    }

    async fn await_drain(&self, session_id: &SessionId, process: &ShellProcess) {
        if !process.wait_drained(self.config.drain_timeout()).await {
            // Typically a background child still holding the pipe open.
            debug!(session_id = %session_id, "Output still open after process exit");
        }
    }
}

/// Resolve the exec directory: missing or empty means the home directory.
async fn resolve_working_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let dir = match requested.filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => dirs::home_dir()
            .ok_or_else(|| Error::internal("home directory could not be determined"))?,
    };
    let is_dir = tokio::fs::metadata(&dir)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        debug!(dir = %dir.display(), "Rejected exec directory");
        return Err(Error::InvalidDirectory(dir));
    }
    Ok(dir)
}
