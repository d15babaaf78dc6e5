//! Path resolution for relorch
//!
//! # Environment Variables
//!
//! - `RELORCH_CONFIG_DIR` - Override config directory
//! - `RELORCH_DATA_DIR` - Override data directory (default database location)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `RELORCH_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/relorch` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\relorch`
//!    - macOS/Linux: `~/.config/relorch`
//!
//! For data_dir():
//! 1. `RELORCH_DATA_DIR` environment variable
//! 2. `XDG_DATA_HOME/relorch` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\relorch`
//!    - macOS/Linux: `~/.local/share/relorch`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "RELORCH_CONFIG_DIR";

/// Environment variable for data directory override
pub const ENV_DATA_DIR: &str = "RELORCH_DATA_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Database file name inside the data directory
pub const DB_FILE: &str = "plm.db";

const APP: &str = "relorch";

/// Get the relorch config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {ENV_CONFIG_DIR}: {}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the relorch data directory path
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        let path = expand(&dir);
        log::debug!("Using data dir from {ENV_DATA_DIR}: {}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        let path = PathBuf::from(xdg_data).join(APP);
        log::debug!("Using XDG_DATA_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("share").join(APP);
    log::debug!("Using default data dir: {}", path.display());
    Ok(path)
}

/// Path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Default database path when neither `--db` nor the config names one
pub fn default_db() -> Result<PathBuf> {
    Ok(data_dir()?.join(DB_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
