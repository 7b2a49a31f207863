//! Shell session state
//!
//! A session binds one id to its current process, working directory,
//! cumulative output and console records. Output fields are written by the
//! session's output pump and by input echo; both go through the same short
//! critical section, which is never held across an `.await`.

use crate::process::ShellProcess;
use crate::sanitize::strip_ansi_escapes;
use crate::types::{ConsoleRecord, ProcessStatus, SessionId, SessionSummary};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A live shell session.
pub(crate) struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    max_output_bytes: Option<usize>,
    state: Mutex<SessionState>,
}

struct SessionState {
    working_dir: PathBuf,
    output: String,
    records: Vec<ConsoleRecord>,
    /// Bumped every time the process is replaced; pumps of older
    /// generations may no longer append.
    generation: u64,
    process: Arc<ShellProcess>,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        working_dir: PathBuf,
        record: ConsoleRecord,
        process: Arc<ShellProcess>,
        max_output_bytes: Option<usize>,
    ) -> Arc<Self> {
        let now = Utc::now();
        Arc::new(Self {
            id,
            created_at: now,
            max_output_bytes,
            state: Mutex::new(SessionState {
                working_dir,
                output: String::new(),
                records: vec![record],
                generation: 0,
                process,
                last_activity: now,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn id(&self) -> &SessionId {
        &self.id
    }

    pub(crate) fn process(&self) -> Arc<ShellProcess> {
        Arc::clone(&self.state().process)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.state().generation
    }

    #[cfg(test)]
    pub(crate) fn working_dir(&self) -> PathBuf {
        self.state().working_dir.clone()
    }

    pub(crate) fn last_activity(&self) -> DateTime<Utc> {
        self.state().last_activity
    }

    pub(crate) fn touch(&self) {
        self.state().last_activity = Utc::now();
    }

    /// Install a new process: reset cumulative output, start a new record.
    ///
    /// Returns the generation the new process's pump must use.
    pub(crate) fn replace_process(
        &self,
        working_dir: &Path,
        record: ConsoleRecord,
        process: Arc<ShellProcess>,
    ) -> u64 {
        let mut state = self.state();
        state.generation += 1;
        state.process = process;
        state.working_dir = working_dir.to_path_buf();
        state.output.clear();
        state.records.push(record);
        state.last_activity = Utc::now();
        state.generation
    }

    /// Append pump output. Returns `false` when `generation` is stale.
    pub(crate) fn append_output(&self, generation: u64, text: &str) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }
        state.append(text, self.max_output_bytes);
        true
    }

    /// Mirror caller input into the output, as if typed at a prompt.
    pub(crate) fn echo_input(&self, text: &str) {
        let mut state = self.state();
        state.append(text, self.max_output_bytes);
        state.last_activity = Utc::now();
    }

    /// Raw cumulative output of the current process (escape codes kept).
    pub(crate) fn output(&self) -> String {
        self.state().output.clone()
    }

    /// Raw console records.
    #[cfg(test)]
    pub(crate) fn records(&self) -> Vec<ConsoleRecord> {
        self.state().records.clone()
    }

    /// Console records with each `output` sanitized.
    pub(crate) fn clean_records(&self) -> Vec<ConsoleRecord> {
        self.state()
            .records
            .iter()
            .map(|record| ConsoleRecord {
                ps1: record.ps1.clone(),
                command: record.command.clone(),
                output: strip_ansi_escapes(&record.output),
            })
            .collect()
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        let state = self.state();
        let returncode = state.process.exit_code();
        SessionSummary {
            session_id: self.id.clone(),
            command: state
                .records
                .last()
                .map(|record| record.command.clone())
                .unwrap_or_default(),
            working_directory: state.working_dir.clone(),
            status: if returncode.is_some() {
                ProcessStatus::Exited
            } else {
                ProcessStatus::Running
            },
            returncode,
            output_bytes: state.output.len(),
            record_count: state.records.len(),
            created_at: self.created_at,
            last_activity: state.last_activity,
        }
    }
}

impl SessionState {
    fn append(&mut self, text: &str, max_output_bytes: Option<usize>) {
        self.output.push_str(text);
        if let Some(record) = self.records.last_mut() {
            record.output.push_str(text);
            if let Some(max) = max_output_bytes {
                retain_tail(&mut record.output, max);
            }
        }
        if let Some(max) = max_output_bytes {
            retain_tail(&mut self.output, max);
        }
    }
}

/// Keep at most the last `max` bytes of `text`, cut on a char boundary.
pub(crate) fn retain_tail(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = text.len() - max;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text.drain(..cut);
}
