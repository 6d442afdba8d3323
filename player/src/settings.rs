use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cuepoint_core::SyncConfig;
use directories::ProjectDirs;
use log::{debug, info};

pub const CONFIG_ENV: &str = "CUEPOINT_CONFIG";

/// Where the configuration comes from, most specific first: the command line,
/// the environment, then the platform config directory if a file exists there.
pub fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .or_else(|| {
            ProjectDirs::from("", "", "cuepoint")
                .map(|dirs| dirs.config_dir().join("config.toml"))
                .filter(|path| path.exists())
        })
}

pub fn load_config(explicit: Option<PathBuf>) -> Result<SyncConfig> {
    match config_path(explicit) {
        Some(path) => {
            info!("Loading config from {}", path.display());
            SyncConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => {
            debug!("No config file, using defaults");
            Ok(SyncConfig::default())
        }
    }
}
