//! Application configuration types

use serde::{Deserialize, Serialize};
use shellbox_core::ShellConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Session manager settings
    #[serde(default)]
    pub shell: ShellConfig,
}

fn default_log_level() -> String {
    "shellbox=info,shellbox_core=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            shell: ShellConfig::default(),
        }
    }
}
