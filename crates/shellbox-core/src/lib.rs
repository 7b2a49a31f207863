//! Shellbox Core - Interactive Shell Session Manager
//!
//! This crate runs shell commands in long-lived, addressable sessions:
//! - Manager: exec, read, wait, write, kill and close operations per session id
//! - Registry: ownership of live sessions and per-id exec serialization
//! - Process: process-group spawning with one merged stdout/stderr pipe
//! - Pump: background draining of process output into the session
//! - Decoder / Sanitize: incremental UTF-8 decoding and ANSI escape removal
//! - Prompt: `user@host:dir $` labels for console records
//!
//! ## Usage
//!
//! ```ignore
//! use shellbox_core::{SessionManager, SessionId};
//!
//! let manager = SessionManager::new();
//! let id = manager.create_session_id();
//! let result = manager.exec_command(&id, None, "ls -la").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod prompt;
pub mod registry;
pub mod sanitize;
pub mod types;

mod manager;
mod process;
mod pump;
mod session;

pub use config::ShellConfig;
pub use error::{Error, ErrorKind, Result};
pub use manager::SessionManager;
pub use prompt::{display_path, format_prompt};
pub use registry::SessionRegistry;
pub use sanitize::strip_ansi_escapes;
pub use types::{
    ConsoleRecord, ExecResult, ExecStatus, KillResult, KillStatus, ProcessStatus, ReadResult,
    SessionId, SessionSummary, WaitResult, WriteResult,
};
