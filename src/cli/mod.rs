//! CLI module for Shellbox
//!
//! Provides commands:
//! - `run`: Execute one command in a fresh session and print its console
//! - `repl`: Line-oriented console driving sessions from stdin

use crate::settings::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub mod repl;
pub mod run;

/// Shellbox CLI
#[derive(Parser, Debug)]
#[command(name = "shellbox")]
#[command(about = "Run shell commands in managed, addressable sessions")]
#[command(version)]
pub struct Cli {
    /// Additional configuration file layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command in a fresh session and exit with its return code
    Run {
        /// Working directory (defaults to the home directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Seconds to wait if the command outlives the grace period
        #[arg(long)]
        wait: Option<i64>,
        /// Command line, joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Drive sessions interactively from stdin
    Repl,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Run { dir, wait, command }) => {
            let code = run::run(config.shell, dir, wait, &command.join(" ")).await?;
            Ok(ExitCode::from(exit_status(code)))
        }
        Some(Commands::Repl) => {
            repl::run(config.shell).await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Map a session return code to a process exit status.
///
/// Signal deaths (negative codes) follow the shell convention `128 + signal`.
fn exit_status(returncode: i32) -> u8 {
    let status = match returncode {
        0..=255 => returncode,
        code if code < 0 => 128i32.saturating_sub(code),
        _ => 255,
    };
    u8::try_from(status).unwrap_or(u8::MAX)
}
