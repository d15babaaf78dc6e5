// Release commands
pub mod execute;
pub mod plan;
pub mod rulesets;

// Store commands
pub mod esign;
pub mod import;

use anyhow::{Context as _, Result};
use plm_store::PlmStore;

use crate::Context;
use crate::config::Config;

/// Open the PLM database named by `--db`, the config, or the default path
pub fn open_store(ctx: &Context, config: &Config) -> Result<PlmStore> {
    let path = config.db_path(ctx.db.as_deref())?;
    log::debug!("Using database {}", path.display());
    PlmStore::open(&path).with_context(|| format!("Could not open database {}", path.display()))
}
