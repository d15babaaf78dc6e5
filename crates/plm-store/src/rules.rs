//! Release rule evaluation
//!
//! Each rule id of a ruleset maps to one check. When the existence rule
//! fails no further rule runs, since every other check reads the artifact.

use crate::catalog::table;
use crate::error::Result;
use crate::PlmStore;
use orchestration::{
    CollaboratorError, Diagnostics, Issue, ReleaseDiagnostics, ReleaseKind, Ruleset,
    is_released_state,
};
use rusqlite::{OptionalExtension, params};
use serde_json::json;

struct RoutingRow {
    item_id: Option<String>,
    mbom_id: Option<String>,
    is_primary: bool,
}

impl PlmStore {
    fn evaluate(
        &self,
        kind: ReleaseKind,
        resource_id: &str,
        ruleset: &Ruleset,
    ) -> Result<Diagnostics> {
        let mut diagnostics = Diagnostics::clean(kind, resource_id, &ruleset.id);
        let resource_type = kind.resource_type();

        let Some(state) = self.state_of(kind, resource_id)? else {
            diagnostics.errors.push(Issue::new(
                format!("{resource_type}_not_found"),
                format!("{resource_type} not found: {resource_id}"),
                format!("{resource_type}.exists"),
            ));
            return Ok(diagnostics);
        };

        for rule in &ruleset.rules {
            match rule.as_str() {
                "routing.exists" | "mbom.exists" | "baseline.exists" => {}
                "routing.not_already_released"
                | "mbom.not_already_released"
                | "baseline.not_already_released" => {
                    if is_released_state(&state) {
                        diagnostics.errors.push(Issue::new(
                            format!("{resource_type}_already_released"),
                            format!("{resource_type} {resource_id} is already released"),
                            rule.clone(),
                        ));
                    }
                }
                "routing.has_operations" => self.routing_has_operations(resource_id, rule, &mut diagnostics)?,
                "routing.has_scope" => self.routing_has_scope(resource_id, rule, &mut diagnostics)?,
                "routing.primary_unique_in_scope" => {
                    self.routing_primary_unique(resource_id, rule, &mut diagnostics)?;
                }
                "routing.operation_workcenters_valid" => {
                    self.routing_workcenters_valid(resource_id, rule, &mut diagnostics)?;
                }
                "mbom.has_non_empty_structure" => {
                    if self.mbom_line_count(resource_id)? == 0 {
                        diagnostics.errors.push(Issue::new(
                            "mbom_empty_structure",
                            format!("MBOM structure is empty: {resource_id}"),
                            rule.clone(),
                        ));
                    }
                }
                "mbom.has_released_routing" => {
                    if self.released_routing_count(resource_id)? == 0 {
                        diagnostics.errors.push(Issue::new(
                            "mbom_missing_released_routing",
                            "MBOM requires at least one released routing before release",
                            rule.clone(),
                        ));
                    }
                }
                "baseline.members_references_exist" => {
                    for issue in self.missing_members(resource_id, rule)? {
                        diagnostics.errors.push(issue);
                    }
                }
                "baseline.warnings_for_unreleased_or_changed_members" => {
                    self.member_warnings(resource_id, rule, &mut diagnostics)?;
                }
                other => log::warn!("No check registered for rule '{other}'"),
            }
        }

        Ok(diagnostics)
    }

    fn routing_row(&self, routing_id: &str) -> Result<Option<RoutingRow>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT item_id, mbom_id, is_primary FROM routings WHERE id = ?1",
                [routing_id],
                |row| {
                    Ok(RoutingRow {
                        item_id: row.get(0)?,
                        mbom_id: row.get(1)?,
                        is_primary: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn routing_has_operations(&self, routing_id: &str, rule: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM routing_operations WHERE routing_id = ?1",
            [routing_id],
            |row| row.get(0),
        )?;
        if count == 0 {
            diagnostics.errors.push(Issue::new(
                "routing_empty_operations",
                format!("Routing has no operations: {routing_id}"),
                rule,
            ));
        }
        Ok(())
    }

    fn routing_has_scope(&self, routing_id: &str, rule: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let Some(row) = self.routing_row(routing_id)? else {
            return Ok(());
        };
        if row.item_id.is_none() && row.mbom_id.is_none() {
            diagnostics.errors.push(Issue::new(
                "routing_missing_scope",
                format!("Routing {routing_id} is attached to neither an item nor an MBOM"),
                rule,
            ));
        }
        Ok(())
    }

    fn routing_primary_unique(&self, routing_id: &str, rule: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let Some(row) = self.routing_row(routing_id)? else {
            return Ok(());
        };
        if !row.is_primary {
            return Ok(());
        }
        let others: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM routings
             WHERE is_primary = 1 AND id != ?1
               AND ((?2 IS NOT NULL AND item_id = ?2) OR (?3 IS NOT NULL AND mbom_id = ?3))",
            params![routing_id, row.item_id, row.mbom_id],
            |r| r.get(0),
        )?;
        if others > 0 {
            diagnostics.errors.push(
                Issue::new(
                    "routing_primary_not_unique",
                    format!("Another primary routing exists in the scope of {routing_id}"),
                    rule,
                )
                .with_details(json!({ "other_primary_count": others })),
            );
        }
        Ok(())
    }

    fn routing_workcenters_valid(&self, routing_id: &str, rule: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut stmt = self.conn().prepare(
            "SELECT o.operation_number, o.workcenter_id, w.id, w.is_active
             FROM routing_operations o
             LEFT JOIN workcenters w ON w.id = o.workcenter_id
             WHERE o.routing_id = ?1 AND o.workcenter_id IS NOT NULL
             ORDER BY o.id",
        )?;
        let rows = stmt.query_map([routing_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<bool>>(3)?,
            ))
        })?;

        for row in rows {
            let (operation, workcenter_id, found, active) = row?;
            let details = json!({ "operation_number": operation, "workcenter_id": workcenter_id });
            if found.is_none() {
                diagnostics.errors.push(
                    Issue::new(
                        "workcenter_not_found",
                        format!("Operation {operation}: workcenter not found: {workcenter_id}"),
                        rule,
                    )
                    .with_details(details),
                );
            } else if active == Some(false) {
                diagnostics.errors.push(
                    Issue::new(
                        "workcenter_inactive",
                        format!("Operation {operation}: workcenter is inactive: {workcenter_id}"),
                        rule,
                    )
                    .with_details(details),
                );
            }
        }
        Ok(())
    }

    pub(crate) fn mbom_line_count(&self, mbom_id: &str) -> Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM mbom_lines WHERE mbom_id = ?1",
            [mbom_id],
            |row| row.get(0),
        )?)
    }

    pub(crate) fn released_routing_count(&self, mbom_id: &str) -> Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM routings WHERE mbom_id = ?1 AND lower(state) = 'released'",
            [mbom_id],
            |row| row.get(0),
        )?)
    }

    /// Errors for members whose item does not exist
    pub(crate) fn missing_members(&self, baseline_id: &str, rule: &str) -> Result<Vec<Issue>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.item_id FROM baseline_members m
             LEFT JOIN items i ON i.id = m.item_id
             WHERE m.baseline_id = ?1 AND i.id IS NULL
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map([baseline_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut issues = Vec::new();
        for row in rows {
            let (member_id, item_id) = row?;
            issues.push(
                Issue::new(
                    "baseline_member_missing_item",
                    format!("Item not found: {item_id}"),
                    rule,
                )
                .with_details(json!({ "member_id": member_id, "item_id": item_id })),
            );
        }
        Ok(issues)
    }

    fn member_warnings(&self, baseline_id: &str, rule: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut stmt = self.conn().prepare(
            "SELECT i.id, i.state, i.generation, m.item_generation
             FROM baseline_members m
             JOIN items i ON i.id = m.item_id
             WHERE m.baseline_id = ?1
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map([baseline_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<u32>>(3)?,
            ))
        })?;

        for row in rows {
            let (item_id, state, generation, captured) = row?;
            if !is_released_state(&state) {
                diagnostics.warnings.push(
                    Issue::new(
                        "baseline_item_not_released",
                        format!("Item {item_id} is not released (state: {state})"),
                        rule,
                    )
                    .with_details(json!({ "item_id": item_id, "item_state": state })),
                );
            }
            if let Some(captured) = captured
                && captured != generation
            {
                diagnostics.warnings.push(
                    Issue::new(
                        "baseline_item_changed",
                        format!(
                            "Item {item_id} changed since the baseline (generation {captured} -> {generation})"
                        ),
                        rule,
                    )
                    .with_details(json!({
                        "item_id": item_id,
                        "baseline_generation": captured,
                        "current_generation": generation,
                    })),
                );
            }
        }
        Ok(())
    }
}

impl ReleaseDiagnostics for PlmStore {
    fn diagnose(
        &self,
        kind: ReleaseKind,
        resource_id: &str,
        ruleset: &Ruleset,
    ) -> std::result::Result<Diagnostics, CollaboratorError> {
        let diagnostics = self.evaluate(kind, resource_id, ruleset)?;
        log::debug!(
            "Diagnostics for {} {resource_id} ({}): {} errors, {} warnings",
            table(kind),
            ruleset.id,
            diagnostics.errors.len(),
            diagnostics.warnings.len()
        );
        Ok(diagnostics)
    }
}
