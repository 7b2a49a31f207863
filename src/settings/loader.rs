//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use std::path::Path;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_with_env(path, None)
}

fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<AppConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Local overrides (optional)
        .add_source(File::with_name("config/local").required(false));

    // 3. Explicit --config file (must exist)
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    // 4. Environment variables (highest priority)
    // prefix_separator("_") keeps SHELLBOX_SHELL__X working with a single `_`
    // after the prefix.
    let config = builder
        .add_source(
            Environment::with_prefix("SHELLBOX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config
        .shell
        .validate()
        .context("Invalid shell configuration")?;
    Ok(config)
}
