//! Readiness assessment
//!
//! Collects per-resource diagnostics for a set of candidates and rolls
//! them up into a readiness report with per-kind counters and the
//! e-sign manifest status of the root item.

use crate::collaborators::Collaborators;
use crate::error::{Error, Result};
use crate::gating::GatingEvaluator;
use crate::registry::Ruleset;
use crate::types::{
    Diagnostics, Readiness, ReadinessSummary, ReleaseCandidate, ReleaseKind, ResourceReadiness,
};
use std::collections::BTreeMap;

/// Diagnose one resource, wrapping store failures
pub fn diagnose(
    collab: &Collaborators<'_>,
    kind: ReleaseKind,
    resource_id: &str,
    ruleset: &Ruleset,
) -> Result<Diagnostics> {
    collab
        .diagnostics
        .diagnose(kind, resource_id, ruleset)
        .map_err(|e| Error::collaborator(format!("diagnose {kind} {resource_id}"), e))
}

/// Build the readiness report for `item_id` over `candidates`.
///
/// Every candidate kind must have a ruleset in `rulesets`.
pub fn assess(
    collab: &Collaborators<'_>,
    item_id: &str,
    generation: u32,
    ruleset_id: &str,
    candidates: &[ReleaseCandidate],
    rulesets: &BTreeMap<ReleaseKind, Ruleset>,
) -> Result<Readiness> {
    let mut resources = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let ruleset = rulesets
            .get(&candidate.kind)
            .ok_or_else(|| Error::UnknownRuleset {
                kind: candidate.kind,
                ruleset_id: ruleset_id.to_string(),
                known: Vec::new(),
            })?;
        let diagnostics = diagnose(collab, candidate.kind, &candidate.resource_id, ruleset)?;
        resources.push(ResourceReadiness {
            kind: candidate.kind,
            resource_id: candidate.resource_id.clone(),
            name: candidate.name.clone(),
            state: candidate.state.clone(),
            diagnostics,
        });
    }

    let esign_manifest = GatingEvaluator::new(collab.manifests)
        .status(item_id, generation)
        .map_err(|e| Error::collaborator("load e-sign manifest", e))?;

    let summary = summarize(&resources);
    let errors = resources
        .iter()
        .flat_map(|r| r.diagnostics.errors.iter().cloned())
        .collect();

    log::debug!(
        "Readiness for {item_id}: {} resources, {} errors, {} warnings",
        summary.resources,
        summary.error_count,
        summary.warning_count
    );

    Ok(Readiness {
        item_id: item_id.to_string(),
        ruleset_id: ruleset_id.to_string(),
        summary,
        resources,
        errors,
        esign_manifest,
    })
}

fn summarize(resources: &[ResourceReadiness]) -> ReadinessSummary {
    let mut summary = ReadinessSummary::default();
    for resource in resources {
        let errors = resource.diagnostics.errors.len();
        let warnings = resource.diagnostics.warnings.len();
        let ok = errors == 0;

        summary.resources += 1;
        summary.error_count += errors;
        summary.warning_count += warnings;
        if ok {
            summary.ok_resources += 1;
        }

        let entry = summary
            .by_kind
            .entry(resource.kind.as_str().to_string())
            .or_default();
        entry.resources += 1;
        entry.error_count += errors;
        entry.warning_count += warnings;
        if ok {
            entry.ok_resources += 1;
        }
    }
    summary.ok = summary.error_count == 0;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RulesetRegistry;
    use crate::resolver;
    use crate::testing::FakePlm;
    use crate::types::{Issue, PlanRequest};

    #[test]
    fn test_summary_counts_by_kind() {
        let plm = FakePlm::new();
        plm.add_item("part-1", 1);
        plm.add_routing("rt-1", Some("part-1"), None, "draft");
        plm.add_routing("rt-2", Some("part-1"), None, "draft");
        plm.add_mbom("mbom-1", "part-1", "draft");
        plm.set_errors(
            "mbom-1",
            vec![Issue::new("mbom_empty", "MBOM has no lines", "mbom.has_non_empty_structure")],
        );
        plm.set_warnings(
            "rt-2",
            vec![Issue::new("routing_note", "note", "routing.has_scope")],
        );

        let request = PlanRequest::default();
        let rulesets = RulesetRegistry::builtin()
            .resolve_all(&request.kinds(), "default")
            .unwrap();
        let collab = plm.collaborators();
        let candidates = resolver::resolve(&plm, "part-1", &request).unwrap();
        let readiness = assess(&collab, "part-1", 1, "default", &candidates, &rulesets).unwrap();

        assert!(!readiness.summary.ok);
        assert_eq!(readiness.summary.resources, 3);
        assert_eq!(readiness.summary.ok_resources, 2);
        assert_eq!(readiness.summary.error_count, 1);
        assert_eq!(readiness.summary.warning_count, 1);
        assert_eq!(readiness.errors.len(), 1);
        assert_eq!(readiness.errors[0].code, "mbom_empty");

        let routing = &readiness.summary.by_kind["routing_release"];
        assert_eq!(routing.resources, 2);
        assert_eq!(routing.warning_count, 1);
        let mbom = &readiness.summary.by_kind["mbom_release"];
        assert_eq!(mbom.ok_resources, 0);
        assert!(readiness.esign_manifest.is_none());
    }

    #[test]
    fn test_empty_readiness_is_ok() {
        let summary = summarize(&[]);
        assert!(summary.ok);
        assert_eq!(summary.resources, 0);
        assert!(summary.by_kind.is_empty());
    }
}
