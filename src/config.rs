//! relorch configuration
//!
//! Loaded from `config.toml` in the config directory. Every section is
//! optional:
//!
//! ```toml
//! [store]
//! db = "~/plm/plm.db"
//!
//! [execute]
//! include_baselines = true
//! rollback_on_failure = true
//! ruleset_id = "strict"
//!
//! [rulesets.routing_release]
//! strict = ["routing.has_operations", "routing.operation_workcenters_valid"]
//!
//! [failpoints]
//! enabled = true
//! keys = ["mbom:mbom-1"]
//! ```

use anyhow::{Context, Result};
use orchestration::{ExecuteOptions, FailpointSet, RulesetConfig, RulesetRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    /// Defaults for `relorch execute`; flags override them
    pub execute: ExecuteOptions,
    /// Extra rulesets by kind, then by ruleset id
    pub rulesets: RulesetConfig,
    pub failpoints: FailpointConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailpointConfig {
    pub enabled: bool,
    pub keys: Vec<String>,
}

impl Config {
    /// Load the config file, or defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    /// Database path: `--db`, then `[store] db`, then the data directory
    pub fn db_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        match &self.store.db {
            Some(db) => Ok(paths::expand(db)),
            None => paths::default_db(),
        }
    }

    /// Built-in rulesets plus the configured ones
    pub fn registry(&self) -> Result<RulesetRegistry> {
        RulesetRegistry::with_configured(&self.rulesets).context("Invalid [rulesets] config")
    }

    /// Failpoints to honor, merging config keys with `--failpoint` flags
    ///
    /// Keys are inert unless `[failpoints] enabled` or the failpoint
    /// environment variable turns them on.
    pub fn failpoints(&self, extra: &[String]) -> FailpointSet {
        if !(self.failpoints.enabled || FailpointSet::env_enabled()) {
            if !extra.is_empty() || !self.failpoints.keys.is_empty() {
                log::warn!(
                    "Failpoints ignored; set [failpoints] enabled = true or {}=1",
                    orchestration::FAILPOINTS_ENV
                );
            }
            return FailpointSet::disabled();
        }
        FailpointSet::enabled(self.failpoints.keys.iter().chain(extra))
    }
}
