//! Child process handle
//!
//! Each command runs as `<shell> -c <command>` in its own process group with
//! stdout and stderr connected to the write end of a single pipe, so the
//! parent reads one combined stream in OS delivery order. A reaper task owns
//! the `Child` and publishes its exit code on a watch channel; everything
//! else (signals, waits, stdin) works through this handle.

use crate::constants::UNKNOWN_EXIT_CODE;
use crate::pump::PumpHandle;
use nix::fcntl::OFlag;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{pipe2, Pid};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read half of the combined stdout/stderr pipe.
pub(crate) type OutputStream = pipe::Receiver;

/// Reaper task dropped its sender without publishing an exit code.
#[derive(Debug)]
pub(crate) struct ExitStatusLost;

/// A spawned shell command.
pub(crate) struct ShellProcess {
    pid: Option<u32>,
    stdin: Mutex<Option<ChildStdin>>,
    exit_rx: watch::Receiver<Option<i32>>,
    reaper: JoinHandle<()>,
    pump: StdMutex<Option<PumpHandle>>,
}

impl ShellProcess {
    /// Spawn `command` under `shell` in `cwd`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        shell: &Path,
        command: &str,
        cwd: &Path,
    ) -> io::Result<(Self, OutputStream)> {
        let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC).map_err(io::Error::from)?;
        let stderr_fd = write_fd.try_clone()?;

        let mut child = {
            // The command holds the parent's copies of the write end; it has to
            // be dropped right after spawning or the reader never sees EOF.
            let mut cmd = Command::new(shell);
            cmd.arg("-c")
                .arg(command)
                .current_dir(cwd)
                .stdin(Stdio::piped())
                .stdout(Stdio::from(write_fd))
                .stderr(Stdio::from(stderr_fd))
                .process_group(0)
                .kill_on_drop(true);
            cmd.spawn()?
        };
        let output = pipe::Receiver::from_owned_fd(read_fd)?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let (exit_tx, exit_rx) = watch::channel(None);
        let reaper = tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => exit_code(status),
                Err(e) => {
                    warn!(pid = ?pid, error = %e, "Failed to collect exit status");
                    UNKNOWN_EXIT_CODE
                }
            };
            debug!(pid = ?pid, code, "Process exited");
            let _ = exit_tx.send(Some(code));
        });

        Ok((
            Self {
                pid,
                stdin: Mutex::new(stdin),
                exit_rx,
                reaper,
                pump: StdMutex::new(None),
            },
            output,
        ))
    }

    /// OS process id (also the process group id).
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code, once the process has been reaped.
    pub(crate) fn exit_code(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.exit_code().is_none()
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// `Ok(None)` means the bound elapsed with the process still running.
    pub(crate) async fn wait_exit(
        &self,
        timeout: Duration,
    ) -> Result<Option<i32>, ExitStatusLost> {
        let mut rx = self.exit_rx.clone();
        let waited = tokio::time::timeout(timeout, async move {
            let code = rx.wait_for(Option::is_some).await.map(|code| *code);
            code
        })
        .await;
        match waited {
            Ok(Ok(code)) => Ok(code),
            Ok(Err(_)) => Err(ExitStatusLost),
            Err(_) => Ok(None),
        }
    }

    /// Send `signal` to the whole process group. Missing groups are ignored.
    pub(crate) fn signal(&self, signal: Signal) {
        let Some(pid) = self.pid else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            debug!(pid, signal = ?signal, error = %e, "Failed to signal process group");
        }
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL and wait up to `force_wait`.
    ///
    /// Returns the exit code if it became observable.
    pub(crate) async fn terminate(&self, grace: Duration, force_wait: Duration) -> Option<i32> {
        if let Some(code) = self.exit_code() {
            return Some(code);
        }
        self.signal(Signal::SIGTERM);
        match self.wait_exit(grace).await {
            Ok(Some(code)) => return Some(code),
            Ok(None) => {}
            Err(ExitStatusLost) => return None,
        }
        warn!(pid = ?self.pid, "Process ignored SIGTERM, force killing");
        self.signal(Signal::SIGKILL);
        self.wait_exit(force_wait).await.ok().flatten()
    }

    /// Write `data` to stdin and flush it.
    pub(crate) async fn write_stdin(&self, data: &[u8]) -> io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))?;
        stdin.write_all(data).await?;
        stdin.flush().await
    }

    pub(crate) fn attach_pump(&self, pump: PumpHandle) {
        *self.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(pump);
    }

    /// Wait up to `timeout` for the output pump to reach end of stream.
    pub(crate) async fn wait_drained(&self, timeout: Duration) -> bool {
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(PumpHandle::watcher);
        match pump {
            Some(watcher) => watcher.wait_stopped(timeout).await,
            None => true,
        }
    }

    /// Whether the output pump task has completed.
    #[cfg(test)]
    pub(crate) fn pump_finished(&self) -> bool {
        self.pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(PumpHandle::is_finished)
    }

    /// Cancel the output pump.
    pub(crate) fn stop_pump(&self) {
        if let Some(pump) = self.pump.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            pump.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn reaper_finished(&self) -> bool {
        self.reaper.is_finished()
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        // Dropping the reaper drops the `Child`, which kills it if still alive.
        self.reaper.abort();
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            pump.abort();
        }
    }
}

/// Exit code, or the negated signal number for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(UNKNOWN_EXIT_CODE)
}
