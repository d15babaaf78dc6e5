//! Candidate resolution
//!
//! Discovers the routings, MBOMs and baselines in scope for a root item,
//! deduplicates them, orders them for forward execution and derives the
//! dependency edges between them.

use crate::collaborators::{ArtifactRecord, CandidateSource, CollaboratorError};
use crate::types::{PlanRequest, ReleaseCandidate, ReleaseKind, StepRef};
use std::collections::BTreeSet;

/// Resolve the ordered release candidates for `item_id`.
///
/// Order is by kind rank (routings, then MBOMs, then baselines), each
/// class sorted by resource id. Classes excluded by the request contribute nothing.
pub fn resolve(
    source: &dyn CandidateSource,
    item_id: &str,
    request: &PlanRequest,
) -> Result<Vec<ReleaseCandidate>, CollaboratorError> {
    // MBOM ids also scope routings, so they are listed whenever either class is wanted
    let mboms = if request.include_mboms || request.include_routings {
        normalize(source.mboms(item_id, request.limits.mbom)?)
    } else {
        Vec::new()
    };

    let routings = if request.include_routings {
        let mbom_ids: Vec<String> = mboms.iter().map(|m| m.id.clone()).collect();
        normalize(source.routings(item_id, &mbom_ids, request.limits.routing)?)
    } else {
        Vec::new()
    };

    let baselines = if request.include_baselines {
        normalize(source.baselines(item_id, request.limits.baseline)?)
    } else {
        Vec::new()
    };

    let mut candidates = Vec::new();

    for routing in &routings {
        candidates.push(candidate(ReleaseKind::RoutingRelease, routing, Vec::new()));
    }

    if request.include_mboms {
        for mbom in &mboms {
            let depends_on = routings
                .iter()
                .filter(|r| r.mbom_id.as_deref() == Some(mbom.id.as_str()))
                .map(|r| StepRef::new(ReleaseKind::RoutingRelease, r.id.clone()))
                .collect();
            candidates.push(candidate(ReleaseKind::MbomRelease, mbom, depends_on));
        }
    }

    let upstream: Vec<StepRef> = candidates.iter().map(ReleaseCandidate::step_ref).collect();
    for baseline in &baselines {
        candidates.push(candidate(
            ReleaseKind::BaselineRelease,
            baseline,
            upstream.clone(),
        ));
    }

    // Stable, so ids stay sorted within a kind
    candidates.sort_by_key(|c| c.kind.rank());

    log::debug!(
        "Resolved {} candidates for {item_id} ({} routings, {} mboms, {} baselines)",
        candidates.len(),
        routings.len(),
        if request.include_mboms { mboms.len() } else { 0 },
        baselines.len()
    );

    Ok(candidates)
}

/// Drop duplicate ids (first wins) and sort by id
fn normalize(records: Vec<ArtifactRecord>) -> Vec<ArtifactRecord> {
    let mut seen = BTreeSet::new();
    let mut records: Vec<ArtifactRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

fn candidate(kind: ReleaseKind, record: &ArtifactRecord, depends_on: Vec<StepRef>) -> ReleaseCandidate {
    ReleaseCandidate {
        kind,
        resource_id: record.id.clone(),
        name: record.name.clone(),
        state: record.state.clone(),
        depends_on,
    }
}
