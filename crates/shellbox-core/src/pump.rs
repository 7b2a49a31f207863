//! Output pump: background draining of a process's combined output
//!
//! One pump runs per spawned process. It reads bounded chunks from the pipe,
//! decodes them and appends the text to the owning session, which it only
//! knows through a `Weak` reference plus the generation it was started for.
//! Once the session is gone or has moved on to another process, the pump
//! stops quietly. Read errors end the pump and are only logged.

use crate::decoder::OutputDecoder;
use crate::session::Session;
use crate::types::SessionId;
use std::sync::Weak;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle of an output pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Reading chunks while the stream is open
    Running,
    /// End of stream seen, flushing the decoder
    Draining,
    /// Finished; nothing more will be appended
    Stopped,
}

/// Owning handle of a running pump task.
#[derive(Debug)]
pub(crate) struct PumpHandle {
    task: JoinHandle<()>,
    state: watch::Receiver<PumpState>,
}

/// Observer for a pump's state that does not own the task.
#[derive(Debug, Clone)]
pub(crate) struct PumpWatcher {
    state: watch::Receiver<PumpState>,
}

impl PumpHandle {
    /// Start draining `output` into `session` for `generation`.
    pub(crate) fn start<R>(
        session_id: SessionId,
        session: Weak<Session>,
        generation: u64,
        output: R,
        chunk_size: usize,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (state_tx, state) = watch::channel(PumpState::Running);
        let task = tokio::spawn(async move {
            run(&session_id, &session, generation, output, chunk_size, &state_tx).await;
            let _ = state_tx.send(PumpState::Stopped);
            debug!(session_id = %session_id, generation, "Output pump stopped");
        });
        Self { task, state }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> PumpState {
        *self.state.borrow()
    }

    pub(crate) fn watcher(&self) -> PumpWatcher {
        PumpWatcher {
            state: self.state.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

impl PumpWatcher {
    /// Wait up to `timeout` for the pump to stop. An aborted pump counts as
    /// stopped.
    pub(crate) async fn wait_stopped(mut self, timeout: Duration) -> bool {
        // `wait_for` only errors once the sender is gone, i.e. the task was aborted.
        let waited = tokio::time::timeout(
            timeout,
            self.state.wait_for(|s| *s == PumpState::Stopped),
        )
        .await;
        waited.is_ok()
    }
}

async fn run<R>(
    session_id: &SessionId,
    session: &Weak<Session>,
    generation: u64,
    mut output: R,
    chunk_size: usize,
    state: &watch::Sender<PumpState>,
) where
    R: AsyncRead + Unpin,
{
    debug!(session_id = %session_id, generation, "Output pump started");
    let mut decoder = OutputDecoder::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        match output.read(&mut buf).await {
            Ok(0) => {
                let _ = state.send(PumpState::Draining);
                let tail = decoder.finish();
                if !tail.is_empty() {
                    deliver(session, generation, &tail);
                }
                return;
            }
            Ok(n) => {
                let text = decoder.decode(&buf[..n], false);
                if text.is_empty() {
                    continue;
                }
                if !deliver(session, generation, &text) {
                    debug!(session_id = %session_id, "Session gone or replaced, stopping pump");
                    return;
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to read process output");
                return;
            }
        }
    }
}

/// Append to the session if it still exists and still runs this generation.
fn deliver(session: &Weak<Session>, generation: u64, text: &str) -> bool {
    match session.upgrade() {
        Some(session) => session.append_output(generation, text),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConsoleRecord;
    use std::path::PathBuf;
    use std::sync::Arc;

    async fn test_session() -> Arc<Session> {
        let (process, _output) = crate::process::ShellProcess::spawn(
            std::path::Path::new("/bin/sh"),
            "true",
            std::path::Path::new("/"),
        )
        .unwrap();
        Session::new(
            SessionId::from("pump-test"),
            PathBuf::from("/"),
            ConsoleRecord::new("u@h:/ $", "true"),
            Arc::new(process),
            None,
        )
    }

    #[tokio::test]
    async fn test_pump_appends_and_stops() {
        let session = test_session().await;
        let generation = session.generation();
        let input: &[u8] = b"hello \xe4\xb8";
        let rest: &[u8] = b"\x96 world\n";
        let reader = tokio_test::io::Builder::new().read(input).read(rest).build();

        let pump = PumpHandle::start(
            SessionId::from("pump-test"),
            Arc::downgrade(&session),
            generation,
            reader,
            4096,
        );
        assert!(pump.watcher().wait_stopped(Duration::from_secs(2)).await);
        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(session.output(), "hello 世 world\n");
        assert_eq!(session.records()[0].output, "hello 世 world\n");
    }

    #[tokio::test]
    async fn test_pump_ignores_stale_generation() {
        let session = test_session().await;
        let stale = session.generation() + 1;
        let reader = tokio_test::io::Builder::new().read(b"late output").build();

        let pump = PumpHandle::start(
            SessionId::from("pump-test"),
            Arc::downgrade(&session),
            stale,
            reader,
            4096,
        );
        assert!(pump.watcher().wait_stopped(Duration::from_secs(2)).await);
        assert_eq!(session.output(), "");
    }

    #[tokio::test]
    async fn test_pump_exits_when_session_dropped() {
        let session = test_session().await;
        let generation = session.generation();
        let weak = Arc::downgrade(&session);
        drop(session);

        let reader = tokio_test::io::Builder::new().read(b"orphan").build();
        let pump = PumpHandle::start(SessionId::from("gone"), weak, generation, reader, 16);
        assert!(pump.watcher().wait_stopped(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_pump_stops_on_read_error() {
        let session = test_session().await;
        let generation = session.generation();
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .build();

        let pump = PumpHandle::start(
            SessionId::from("pump-test"),
            Arc::downgrade(&session),
            generation,
            reader,
            4096,
        );
        assert!(pump.watcher().wait_stopped(Duration::from_secs(2)).await);
        assert_eq!(session.output(), "partial");
    }
}
