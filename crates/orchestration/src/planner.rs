//! Plan construction
//!
//! A plan is a read-only snapshot: ordered steps with an action each,
//! the readiness report of the root item, and a fingerprint that is
//! equal for equal plans.

use crate::collaborators::Collaborators;
use crate::error::{Error, Result};
use crate::readiness;
use crate::registry::{Ruleset, RulesetRegistry};
use crate::resolver;
use crate::types::{
    DEFAULT_RULESET, Limits, MAX_LIMIT, Plan, PlanRequest, PlanStep, Readiness, ReleaseCandidate,
    ReleaseKind, ResourceReadiness, StepAction,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A plan together with what execution needs to re-check it
pub(crate) struct PreparedPlan {
    pub plan: Plan,
    pub generation: u32,
    pub rulesets: BTreeMap<ReleaseKind, Ruleset>,
}

/// Reject limits outside `0..=MAX_LIMIT`
pub fn validate_limits(limits: &Limits) -> Result<()> {
    for (name, value) in [
        ("routing_limit", limits.routing),
        ("mbom_limit", limits.mbom),
        ("baseline_limit", limits.baseline),
    ] {
        if value > MAX_LIMIT {
            return Err(Error::InvalidLimit {
                name: name.to_string(),
                value,
                max: MAX_LIMIT,
            });
        }
    }
    Ok(())
}

/// Build a plan for `item_id`
pub fn build(
    collab: &Collaborators<'_>,
    registry: &RulesetRegistry,
    item_id: &str,
    request: &PlanRequest,
) -> Result<Plan> {
    prepare(collab, registry, item_id, request).map(|prepared| prepared.plan)
}

pub(crate) fn prepare(
    collab: &Collaborators<'_>,
    registry: &RulesetRegistry,
    item_id: &str,
    request: &PlanRequest,
) -> Result<PreparedPlan> {
    let ruleset_id = match request.ruleset_id.trim() {
        "" => DEFAULT_RULESET,
        trimmed => trimmed,
    };
    let rulesets = registry.resolve_all(&request.kinds(), ruleset_id)?;
    validate_limits(&request.limits)?;

    let generation = collab
        .items
        .current_generation(item_id)
        .map_err(|e| Error::collaborator("load item", e))?
        .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

    let candidates = resolver::resolve(collab.candidates, item_id, request)
        .map_err(|e| Error::collaborator("resolve candidates", e))?;

    let readiness = readiness::assess(
        collab,
        item_id,
        generation,
        ruleset_id,
        &candidates,
        &rulesets,
    )?;

    let gate_closed = readiness
        .esign_manifest
        .as_ref()
        .is_some_and(|status| !status.is_complete);

    let steps: Vec<PlanStep> = candidates
        .into_iter()
        .zip(&readiness.resources)
        .map(|(candidate, resource)| step(candidate, resource, gate_closed))
        .collect();

    let fingerprint = fingerprint(&steps, &readiness)?;
    log::info!(
        "Planned {} steps for {item_id} under '{ruleset_id}' ({fingerprint:.12})",
        steps.len()
    );

    Ok(PreparedPlan {
        plan: Plan {
            item_id: item_id.to_string(),
            ruleset_id: ruleset_id.to_string(),
            readiness,
            steps,
            fingerprint,
        },
        generation,
        rulesets,
    })
}

fn step(candidate: ReleaseCandidate, resource: &ResourceReadiness, gate_closed: bool) -> PlanStep {
    let action = if candidate.is_released() {
        StepAction::SkipAlreadyReleased
    } else if candidate.kind == ReleaseKind::BaselineRelease && gate_closed {
        StepAction::RequiresEsign
    } else {
        StepAction::Execute
    };

    PlanStep {
        kind: candidate.kind,
        resource_type: candidate.kind.resource_type().to_string(),
        resource_id: candidate.resource_id,
        name: candidate.name,
        state: candidate.state,
        action,
        depends_on: candidate.depends_on,
        diagnostics: resource.diagnostics.clone(),
    }
}

#[derive(Serialize)]
struct Fingerprinted<'a> {
    steps: &'a [PlanStep],
    readiness: &'a Readiness,
}

fn fingerprint(steps: &[PlanStep], readiness: &Readiness) -> Result<String> {
    let canonical = serde_json::to_vec(&Fingerprinted { steps, readiness })?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}
