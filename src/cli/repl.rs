//! Line-oriented session console
//!
//! Reads one command per line and prints each result as a JSON line.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::json;
use shellbox_core::{SessionId, SessionManager, ShellConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HELP: &str = "\
commands:
  exec [<id>] <command>   run a command (new session unless <id> is live)
  cd <dir>                working directory for later execs
  read <id>               sanitized output and console records
  records <id>            console records only
  wait <id> [secs]        wait for the current process
  write <id> <text>       send a line to the process
  kill <id>               terminate the process group
  close <id>              kill and forget the session
  list                    all sessions
  help                    this text
  quit                    leave";

/// A parsed console line.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Exec { head: String, rest: String },
    Cd(PathBuf),
    Read(SessionId),
    Records(SessionId),
    Wait(SessionId, Option<i64>),
    Write(SessionId, String),
    Kill(SessionId),
    Close(SessionId),
    List,
    Help,
    Quit,
}

/// Run the console on stdin/stdout until `quit` or end of input.
pub async fn run(config: ShellConfig) -> Result<()> {
    let manager = Arc::new(
        SessionManager::with_config(config).context("Invalid shell configuration")?,
    );
    let cancel = CancellationToken::new();
    let janitor = manager.spawn_janitor(cancel.clone());

    let mut repl = Repl::new(Arc::clone(&manager));
    let result = repl
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    cancel.cancel();
    if let Some(janitor) = janitor {
        let _ = janitor.await;
    }
    manager.shutdown().await;
    result
}

struct Repl {
    manager: Arc<SessionManager>,
    cwd: Option<PathBuf>,
}

impl Repl {
    fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager, cwd: None }
    }

    async fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Shellbox console ready");
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let reply = match parse(&line) {
                Ok(None) => continue,
                Ok(Some(ReplCommand::Quit)) => break,
                Ok(Some(ReplCommand::Help)) => json!({ "help": HELP }).to_string(),
                Ok(Some(command)) => self.dispatch(command).await,
                Err(e) => json!({ "error": "bad_command", "message": e.to_string() }).to_string(),
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: ReplCommand) -> String {
        let manager = &self.manager;
        match command {
            ReplCommand::Exec { head, rest } => {
                let live = SessionId::from(head.as_str());
                let (id, line) = if !rest.is_empty() && manager.registry().contains(&live).await {
                    (live, rest)
                } else {
                    let line = if rest.is_empty() {
                        head
                    } else {
                        format!("{} {}", head, rest)
                    };
                    (manager.create_session_id(), line)
                };
                to_json(manager.exec_command(&id, self.cwd.as_deref(), &line).await)
            }
            ReplCommand::Cd(dir) => {
                if dir.is_dir() {
                    debug!(dir = %dir.display(), "Console directory changed");
                    let reply = json!({ "cwd": dir }).to_string();
                    self.cwd = Some(dir);
                    reply
                } else {
                    json!({
                        "error": "invalid_directory",
                        "message": format!("not a directory: {}", dir.display()),
                    })
                    .to_string()
                }
            }
            ReplCommand::Read(id) => to_json(manager.read_shell_output(&id, true).await),
            ReplCommand::Records(id) => to_json(manager.get_console_records(&id).await),
            ReplCommand::Wait(id, secs) => to_json(manager.wait_process(&id, secs).await),
            ReplCommand::Write(id, text) => {
                to_json(manager.write_shell_input(&id, &text, true).await)
            }
            ReplCommand::Kill(id) => to_json(manager.kill_process(&id).await),
            ReplCommand::Close(id) => to_json(manager.close_session(&id).await),
            ReplCommand::List => to_json(Ok(manager.list_sessions().await)),
            ReplCommand::Help | ReplCommand::Quit => String::new(),
        }
    }
}

fn to_json<T: Serialize>(result: shellbox_core::Result<T>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value)
            .unwrap_or_else(|e| json!({ "error": "serialization", "message": e.to_string() }).to_string()),
        Err(e) => json!({ "error": e.code(), "message": e.user_message() }).to_string(),
    }
}

/// Parse one input line. Blank lines yield `None`.
fn parse(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, args) = split_word(line);
    let command = match verb {
        "exec" => {
            if args.is_empty() {
                bail!("usage: exec [<id>] <command>");
            }
            let (head, rest) = split_word(args);
            ReplCommand::Exec {
                head: head.to_string(),
                rest: rest.to_string(),
            }
        }
        "cd" => ReplCommand::Cd(PathBuf::from(required(args, "cd <dir>")?)),
        "read" => ReplCommand::Read(session_arg(args, "read <id>")?),
        "records" => ReplCommand::Records(session_arg(args, "records <id>")?),
        "wait" => {
            let (id, secs) = split_word(args);
            let id = session_arg(id, "wait <id> [secs]")?;
            let secs = if secs.is_empty() {
                None
            } else {
                Some(secs.parse().context("wait: seconds must be an integer")?)
            };
            ReplCommand::Wait(id, secs)
        }
        "write" => {
            let (id, text) = split_word(args);
            ReplCommand::Write(session_arg(id, "write <id> <text>")?, text.to_string())
        }
        "kill" => ReplCommand::Kill(session_arg(args, "kill <id>")?),
        "close" => ReplCommand::Close(session_arg(args, "close <id>")?),
        "list" => ReplCommand::List,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command `{}` (try `help`)", other),
    };
    Ok(Some(command))
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn required<'a>(args: &'a str, usage: &str) -> Result<&'a str> {
    if args.is_empty() {
        bail!("usage: {}", usage);
    }
    Ok(args)
}

fn session_arg(args: &str, usage: &str) -> Result<SessionId> {
    Ok(SessionId::from(required(args, usage)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> Arc<SessionManager> {
        let config = ShellConfig {
            shell: PathBuf::from("/bin/sh"),
            exec_grace_ms: 2_000,
            ..ShellConfig::default()
        };
        Arc::new(SessionManager::with_config(config).unwrap())
    }

    async fn drive(input: &str) -> Vec<serde_json::Value> {
        let mut repl = Repl::new(test_manager());
        repl.cwd = Some(PathBuf::from("/"));
        let mut output = Vec::new();
        repl.serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(
            parse("exec echo hi there").unwrap(),
            Some(ReplCommand::Exec {
                head: "echo".to_string(),
                rest: "hi there".to_string()
            })
        );
        assert_eq!(
            parse("wait abc 10").unwrap(),
            Some(ReplCommand::Wait(SessionId::from("abc"), Some(10)))
        );
        assert_eq!(
            parse("write abc echo  hi").unwrap(),
            Some(ReplCommand::Write(SessionId::from("abc"), "echo  hi".to_string()))
        );
        assert_eq!(parse("quit").unwrap(), Some(ReplCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("exec").is_err());
        assert!(parse("read").is_err());
        assert!(parse("wait abc soon").is_err());
        assert!(parse("launch rockets").is_err());
    }

    #[tokio::test]
    async fn test_exec_then_list_and_quit() {
        let replies = drive("exec echo hi\nlist\nquit\nlist\n").await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["status"], "completed");
        assert_eq!(replies[0]["returncode"], 0);
        assert_eq!(replies[0]["output"], "hi\n");
        assert_eq!(replies[1].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_reported_as_json() {
        let replies = drive("read nope\nbogus\ncd /definitely/missing\n").await;
        assert_eq!(replies[0]["error"], "session_not_found");
        assert_eq!(replies[1]["error"], "bad_command");
        assert_eq!(replies[2]["error"], "invalid_directory");
    }

    #[tokio::test]
    async fn test_help_is_a_json_line() {
        let replies = drive("help\nlist\n").await;
        assert_eq!(replies.len(), 2);
        let help = replies[0]["help"].as_str().unwrap();
        assert!(help.contains("exec [<id>] <command>"));
        assert!(replies[1].is_array());
    }

    #[tokio::test]
    async fn test_exec_reuses_live_session() {
        let manager = test_manager();
        let mut repl = Repl::new(Arc::clone(&manager));
        repl.cwd = Some(PathBuf::from("/"));
        let first = repl
            .dispatch(parse("exec echo one").unwrap().unwrap())
            .await;
        let first: serde_json::Value = serde_json::from_str(&first).unwrap();
        let id = first["session_id"].as_str().unwrap().to_string();

        repl.dispatch(parse(&format!("exec {} echo two", id)).unwrap().unwrap())
            .await;
        let records = manager
            .get_console_records(&SessionId::from(id.as_str()))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].output, "two\n");
        assert_eq!(manager.list_sessions().await.len(), 1);
    }
}
