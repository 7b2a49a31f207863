//! Application settings
//!
//! Layered configuration for the `shellbox` binary.

mod config;
mod loader;

pub use config::AppConfig;
pub use loader::load_config;
