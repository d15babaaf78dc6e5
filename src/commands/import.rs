use anyhow::{Context as _, Result};
use plm_store::Fixture;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::commands::open_store;
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let fixture = Fixture::from_toml(&content)?;

    let config = Config::load()?;
    let store = open_store(ctx, &config)?;
    let summary = store.import(&fixture)?;

    if !ctx.quiet {
        ui::success(&format!("Imported {}", path.display()));
        ui::kv("items", &summary.items.to_string());
        ui::kv("workcenters", &summary.workcenters.to_string());
        ui::kv(
            "routings",
            &format!("{} ({} operations)", summary.routings, summary.operations),
        );
        ui::kv(
            "mboms",
            &format!("{} ({} lines)", summary.mboms, summary.mbom_lines),
        );
        ui::kv(
            "baselines",
            &format!("{} ({} members)", summary.baselines, summary.baseline_members),
        );
        ui::kv("manifests", &summary.manifests.to_string());
    }
    Ok(())
}
