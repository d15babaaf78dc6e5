//! Items and manufacturing artifacts: writes, lookups and candidate queries

use crate::error::{Error, Result};
use crate::PlmStore;
use orchestration::{
    ArtifactRecord, CandidateSource, CollaboratorError, ItemDirectory, ReleaseKind,
};
use rusqlite::{OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};

/// An engineering item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub generation: u32,
    pub state: String,
}

/// A routing to insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRouting {
    pub id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub mbom_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// An MBOM to insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMbom {
    pub id: String,
    pub source_item_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plant_code: Option<String>,
}

/// A baseline to insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBaseline {
    pub id: String,
    pub root_item_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Table holding artifacts of a kind
pub(crate) fn table(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::RoutingRelease => "routings",
        ReleaseKind::MbomRelease => "mboms",
        ReleaseKind::BaselineRelease => "baselines",
    }
}

fn kind_for(resource_type: &str) -> Result<ReleaseKind> {
    resource_type
        .parse()
        .map_err(|_| Error::Invalid(format!("unknown resource type: {resource_type}")))
}

impl PlmStore {
    /// Insert or update an item
    pub fn upsert_item(&self, id: &str, generation: u32, state: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO items (id, generation, state) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                generation = excluded.generation,
                state = excluded.state",
            params![id, generation, state],
        )?;
        Ok(())
    }

    /// Look up an item
    pub fn item(&self, id: &str) -> Result<Option<ItemRecord>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, generation, state FROM items WHERE id = ?1",
                [id],
                |row| {
                    Ok(ItemRecord {
                        id: row.get(0)?,
                        generation: row.get(1)?,
                        state: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Current generation of an item, failing if it does not exist
    pub(crate) fn require_generation(&self, item_id: &str) -> Result<u32> {
        self.item(item_id)?
            .map(|item| item.generation)
            .ok_or_else(|| Error::not_found("item", item_id))
    }

    pub fn add_workcenter(&self, id: &str, code: &str, is_active: bool) -> Result<()> {
        self.conn().execute(
            "INSERT INTO workcenters (id, code, is_active) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, is_active = excluded.is_active",
            params![id, code, is_active],
        )?;
        Ok(())
    }

    pub fn add_routing(&self, routing: &NewRouting) -> Result<()> {
        self.conn().execute(
            "INSERT INTO routings (id, item_id, mbom_id, name, is_primary)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                routing.id,
                routing.item_id,
                routing.mbom_id,
                routing.name,
                routing.is_primary
            ],
        )?;
        Ok(())
    }

    pub fn add_operation(
        &self,
        routing_id: &str,
        operation_number: &str,
        workcenter_id: Option<&str>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO routing_operations (routing_id, operation_number, workcenter_id)
             VALUES (?1, ?2, ?3)",
            params![routing_id, operation_number, workcenter_id],
        )?;
        Ok(())
    }

    pub fn add_mbom(&self, mbom: &NewMbom) -> Result<()> {
        self.conn().execute(
            "INSERT INTO mboms (id, source_item_id, name, plant_code) VALUES (?1, ?2, ?3, ?4)",
            params![mbom.id, mbom.source_item_id, mbom.name, mbom.plant_code],
        )?;
        Ok(())
    }

    pub fn add_mbom_line(&self, mbom_id: &str, child_item_id: &str, quantity: f64) -> Result<()> {
        if quantity <= 0.0 {
            return Err(Error::Invalid(format!(
                "quantity for {child_item_id} in {mbom_id} must be positive"
            )));
        }
        self.conn().execute(
            "INSERT INTO mbom_lines (mbom_id, child_item_id, quantity) VALUES (?1, ?2, ?3)",
            params![mbom_id, child_item_id, quantity],
        )?;
        Ok(())
    }

    pub fn add_baseline(&self, baseline: &NewBaseline) -> Result<()> {
        self.conn().execute(
            "INSERT INTO baselines (id, root_item_id, name) VALUES (?1, ?2, ?3)",
            params![baseline.id, baseline.root_item_id, baseline.name],
        )?;
        Ok(())
    }

    /// Add a member; `item_generation` is the generation captured by the baseline
    pub fn add_baseline_member(
        &self,
        baseline_id: &str,
        item_id: &str,
        item_generation: Option<u32>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO baseline_members (baseline_id, item_id, item_generation)
             VALUES (?1, ?2, ?3)",
            params![baseline_id, item_id, item_generation],
        )?;
        Ok(())
    }

    /// Lifecycle value of an artifact, by resource type ("routing", "mbom", "baseline")
    pub fn artifact_state(&self, resource_type: &str, id: &str) -> Result<String> {
        let kind = kind_for(resource_type)?;
        self.state_of(kind, id)?
            .ok_or_else(|| Error::not_found(kind.resource_type(), id))
    }

    pub(crate) fn state_of(&self, kind: ReleaseKind, id: &str) -> Result<Option<String>> {
        let sql = format!("SELECT state FROM {} WHERE id = ?1", table(kind));
        Ok(self
            .conn()
            .query_row(&sql, [id], |row| row.get(0))
            .optional()?)
    }

    fn records(&self, sql: &str, args: &[String]) -> Result<Vec<ArtifactRecord>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(ArtifactRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                state: row.get(2)?,
                mbom_id: row.get(3)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl ItemDirectory for PlmStore {
    fn current_generation(&self, item_id: &str) -> std::result::Result<Option<u32>, CollaboratorError> {
        Ok(self.item(item_id)?.map(|item| item.generation))
    }
}

impl CandidateSource for PlmStore {
    fn routings(
        &self,
        item_id: &str,
        mbom_ids: &[String],
        limit: u32,
    ) -> std::result::Result<Vec<ArtifactRecord>, CollaboratorError> {
        let mut args = vec![item_id.to_string()];
        let mut scope = "item_id = ?1".to_string();
        if !mbom_ids.is_empty() {
            let placeholders: Vec<String> =
                (0..mbom_ids.len()).map(|i| format!("?{}", i + 2)).collect();
            scope = format!("{scope} OR mbom_id IN ({})", placeholders.join(", "));
            args.extend(mbom_ids.iter().cloned());
        }
        let sql = format!(
            "SELECT id, name, state, mbom_id FROM routings
             WHERE {scope}
             ORDER BY rowid DESC
             LIMIT {limit}"
        );
        Ok(self.records(&sql, &args)?)
    }

    fn mboms(
        &self,
        source_item_id: &str,
        limit: u32,
    ) -> std::result::Result<Vec<ArtifactRecord>, CollaboratorError> {
        let sql = format!(
            "SELECT id, name, state, NULL FROM mboms
             WHERE source_item_id = ?1
             ORDER BY rowid DESC
             LIMIT {limit}"
        );
        Ok(self.records(&sql, &[source_item_id.to_string()])?)
    }

    fn baselines(
        &self,
        root_item_id: &str,
        limit: u32,
    ) -> std::result::Result<Vec<ArtifactRecord>, CollaboratorError> {
        let sql = format!(
            "SELECT id, name, state, NULL FROM baselines
             WHERE root_item_id = ?1
             ORDER BY rowid DESC
             LIMIT {limit}"
        );
        Ok(self.records(&sql, &[root_item_id.to_string()])?)
    }
}
