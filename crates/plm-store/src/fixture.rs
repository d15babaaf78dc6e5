//! TOML fixtures for seeding a store
//!
//! ```toml
//! [[items]]
//! id = "part-1"
//! generation = 1
//!
//! [[routings]]
//! id = "rt-1"
//! item_id = "part-1"
//! is_primary = true
//! operations = [{ number = "10", workcenter = "wc-1" }]
//!
//! [[manifests]]
//! item_id = "part-1"
//! requirements = [{ meaning = "approved", required = true }]
//! ```

use crate::catalog::{NewBaseline, NewMbom, NewRouting};
use crate::error::{Error, Result};
use crate::PlmStore;
use orchestration::SignatureRequirement;
use serde::{Deserialize, Serialize};

fn default_generation() -> u32 {
    1
}

fn default_state() -> String {
    "draft".to_string()
}

fn default_true() -> bool {
    true
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureItem {
    pub id: String,
    #[serde(default = "default_generation")]
    pub generation: u32,
    #[serde(default = "default_state")]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureWorkcenter {
    pub id: String,
    pub code: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureOperation {
    pub number: String,
    #[serde(default)]
    pub workcenter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRouting {
    #[serde(flatten)]
    pub routing: NewRouting,
    #[serde(default)]
    pub operations: Vec<FixtureOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureLine {
    pub child_item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureMbom {
    #[serde(flatten)]
    pub mbom: NewMbom,
    #[serde(default)]
    pub lines: Vec<FixtureLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureMember {
    pub item_id: String,
    /// Generation captured by the baseline
    #[serde(default)]
    pub generation: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureBaseline {
    #[serde(flatten)]
    pub baseline: NewBaseline,
    #[serde(default)]
    pub members: Vec<FixtureMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifest {
    pub item_id: String,
    /// Defaults to the item's current generation
    #[serde(default)]
    pub generation: Option<u32>,
    pub requirements: Vec<SignatureRequirement>,
}

/// Everything a fixture file can seed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub items: Vec<FixtureItem>,
    pub workcenters: Vec<FixtureWorkcenter>,
    pub routings: Vec<FixtureRouting>,
    pub mboms: Vec<FixtureMbom>,
    pub baselines: Vec<FixtureBaseline>,
    pub manifests: Vec<FixtureManifest>,
}

impl Fixture {
    /// Parse a fixture from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Invalid(format!("fixture: {e}")))
    }
}

/// Counts of what an import inserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub items: usize,
    pub workcenters: usize,
    pub routings: usize,
    pub operations: usize,
    pub mboms: usize,
    pub mbom_lines: usize,
    pub baselines: usize,
    pub baseline_members: usize,
    pub manifests: usize,
}

impl PlmStore {
    /// Import a fixture in one transaction; nothing is written on error
    pub fn import(&self, fixture: &Fixture) -> Result<ImportSummary> {
        let tx = self.conn().unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for item in &fixture.items {
            self.upsert_item(&item.id, item.generation, &item.state)?;
            summary.items += 1;
        }
        for wc in &fixture.workcenters {
            self.add_workcenter(&wc.id, &wc.code, wc.active)?;
            summary.workcenters += 1;
        }
        for mbom in &fixture.mboms {
            self.add_mbom(&mbom.mbom)?;
            summary.mboms += 1;
            for line in &mbom.lines {
                self.add_mbom_line(&mbom.mbom.id, &line.child_item_id, line.quantity)?;
                summary.mbom_lines += 1;
            }
        }
        for routing in &fixture.routings {
            self.add_routing(&routing.routing)?;
            summary.routings += 1;
            for op in &routing.operations {
                self.add_operation(&routing.routing.id, &op.number, op.workcenter.as_deref())?;
                summary.operations += 1;
            }
        }
        for baseline in &fixture.baselines {
            self.add_baseline(&baseline.baseline)?;
            summary.baselines += 1;
            for member in &baseline.members {
                self.add_baseline_member(&baseline.baseline.id, &member.item_id, member.generation)?;
                summary.baseline_members += 1;
            }
        }
        for manifest in &fixture.manifests {
            self.create_manifest(&manifest.item_id, manifest.generation, &manifest.requirements)?;
            summary.manifests += 1;
        }

        tx.commit()?;
        log::info!(
            "Imported fixture: {} items, {} routings, {} MBOMs, {} baselines, {} manifests",
            summary.items,
            summary.routings,
            summary.mboms,
            summary.baselines,
            summary.manifests
        );
        Ok(summary)
    }
}
