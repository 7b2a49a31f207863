//! One-shot command execution

use anyhow::{Context, Result};
use shellbox_core::{ConsoleRecord, SessionId, SessionManager, ShellConfig};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Run `command` in a fresh session, print its console and return its code.
pub async fn run(
    config: ShellConfig,
    dir: Option<PathBuf>,
    wait: Option<i64>,
    command: &str,
) -> Result<i32> {
    let manager = SessionManager::with_config(config).context("Invalid shell configuration")?;
    let id = manager.create_session_id();

    let outcome = execute(&manager, &id, dir, wait, command).await;
    manager.shutdown().await;
    let (returncode, records) = outcome?;

    let mut stdout = tokio::io::stdout();
    for record in &records {
        stdout.write_all(render_record(record).as_bytes()).await?;
    }
    stdout.flush().await?;
    Ok(returncode)
}

async fn execute(
    manager: &SessionManager,
    id: &SessionId,
    dir: Option<PathBuf>,
    wait: Option<i64>,
    command: &str,
) -> Result<(i32, Vec<ConsoleRecord>)> {
    let result = manager
        .exec_command(id, dir.as_deref(), command)
        .await
        .with_context(|| format!("Failed to run `{}`", command))?;

    let returncode = match result.returncode {
        Some(code) => code,
        None => {
            debug!(session_id = %id, "Command outlived grace period, waiting");
            manager
                .wait_process(id, wait)
                .await
                .context("Command did not finish")?
                .returncode
        }
    };
    let records = manager.get_console_records(id).await?;
    Ok((returncode, records))
}

/// Render a console record the way a terminal would have shown it.
pub fn render_record(record: &ConsoleRecord) -> String {
    let mut text = format!("{} {}\n{}", record.ps1, record.command, record.output);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
