//! In-memory PLM fake used by the unit tests

use crate::collaborators::{
    ArtifactRecord, CandidateSource, CollaboratorError, Collaborators, EsignManifest, ItemDirectory,
    Lifecycle, ManifestStore, ReleaseDiagnostics, Signature, SignatureRequirement,
    TransitionContext, TransitionError,
};
use crate::registry::Ruleset;
use crate::types::{Diagnostics, Issue, ReleaseKind, is_released_state};
use chrono::Utc;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct Artifact {
    id: String,
    owner: Option<String>,
    mbom_id: Option<String>,
    state: String,
}

#[derive(Default)]
struct State {
    items: BTreeMap<String, u32>,
    routings: Vec<Artifact>,
    mboms: Vec<Artifact>,
    baselines: Vec<Artifact>,
    errors: BTreeMap<String, Vec<Issue>>,
    warnings: BTreeMap<String, Vec<Issue>>,
    manifests: BTreeMap<(String, u32), EsignManifest>,
    signatures: Vec<(String, u32, Signature)>,
    rejected: BTreeMap<String, String>,
    failing_reopens: BTreeSet<String>,
    unavailable: BTreeSet<String>,
    manifest_queries: usize,
    events: Vec<String>,
}

impl State {
    fn artifacts(&self, kind: ReleaseKind) -> &Vec<Artifact> {
        match kind {
            ReleaseKind::RoutingRelease => &self.routings,
            ReleaseKind::MbomRelease => &self.mboms,
            ReleaseKind::BaselineRelease => &self.baselines,
        }
    }

    fn artifact_mut(&mut self, kind: ReleaseKind, id: &str) -> Option<&mut Artifact> {
        let list = match kind {
            ReleaseKind::RoutingRelease => &mut self.routings,
            ReleaseKind::MbomRelease => &mut self.mboms,
            ReleaseKind::BaselineRelease => &mut self.baselines,
        };
        list.iter_mut().find(|a| a.id == id)
    }
}

/// In-memory implementation of every collaborator contract
#[derive(Default)]
pub struct FakePlm {
    state: RefCell<State>,
}

impl FakePlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, id: &str, generation: u32) {
        self.state
            .borrow_mut()
            .items
            .insert(id.to_string(), generation);
    }

    pub fn add_routing(&self, id: &str, item_id: Option<&str>, mbom_id: Option<&str>, state: &str) {
        self.state.borrow_mut().routings.push(Artifact {
            id: id.to_string(),
            owner: item_id.map(str::to_string),
            mbom_id: mbom_id.map(str::to_string),
            state: state.to_string(),
        });
    }

    pub fn add_mbom(&self, id: &str, source_item_id: &str, state: &str) {
        self.state.borrow_mut().mboms.push(Artifact {
            id: id.to_string(),
            owner: Some(source_item_id.to_string()),
            mbom_id: None,
            state: state.to_string(),
        });
    }

    pub fn add_baseline(&self, id: &str, root_item_id: &str, state: &str) {
        self.state.borrow_mut().baselines.push(Artifact {
            id: id.to_string(),
            owner: Some(root_item_id.to_string()),
            mbom_id: None,
            state: state.to_string(),
        });
    }

    /// Errors reported for a resource whenever their rule is in the ruleset
    pub fn set_errors(&self, id: &str, issues: Vec<Issue>) {
        self.state.borrow_mut().errors.insert(id.to_string(), issues);
    }

    pub fn set_warnings(&self, id: &str, issues: Vec<Issue>) {
        self.state
            .borrow_mut()
            .warnings
            .insert(id.to_string(), issues);
    }

    pub fn add_manifest(&self, item_id: &str, generation: u32, required: &[&str]) {
        let manifest = EsignManifest {
            id: format!("manifest-{item_id}-{generation}"),
            item_id: item_id.to_string(),
            generation,
            requirements: required
                .iter()
                .map(|meaning| SignatureRequirement {
                    meaning: (*meaning).to_string(),
                    role: None,
                    required: true,
                })
                .collect(),
        };
        self.state
            .borrow_mut()
            .manifests
            .insert((item_id.to_string(), generation), manifest);
    }

    pub fn sign(&self, item_id: &str, generation: u32, meaning: &str) {
        let mut state = self.state.borrow_mut();
        let id = format!("sig-{}", state.signatures.len() + 1);
        state.signatures.push((
            item_id.to_string(),
            generation,
            Signature {
                id,
                meaning: meaning.to_string(),
                signer: "tester".to_string(),
                signed_at: Utc::now(),
                revoked: false,
            },
        ));
    }

    /// Make every release of `id` fail with an artifact rejection
    pub fn reject_release(&self, id: &str, message: &str) {
        self.state
            .borrow_mut()
            .rejected
            .insert(id.to_string(), message.to_string());
    }

    /// Make reopening `id` fail
    pub fn fail_reopen(&self, id: &str) {
        self.state
            .borrow_mut()
            .failing_reopens
            .insert(id.to_string());
    }

    /// Make any transition of `id` a storage failure
    pub fn make_unavailable(&self, id: &str) {
        self.state.borrow_mut().unavailable.insert(id.to_string());
    }

    pub fn state_of(&self, id: &str) -> String {
        let state = self.state.borrow();
        ReleaseKind::ALL
            .iter()
            .flat_map(|kind| state.artifacts(*kind).iter())
            .find(|a| a.id == id)
            .map(|a| a.state.clone())
            .unwrap_or_default()
    }

    /// Lifecycle calls in order, e.g. `release:rt-1`, `reopen:rt-1`
    pub fn events(&self) -> Vec<String> {
        self.state.borrow().events.clone()
    }

    pub fn manifest_queries(&self) -> usize {
        self.state.borrow().manifest_queries
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            items: self,
            candidates: self,
            diagnostics: self,
            manifests: self,
            routings: Box::new(FakeLifecycle {
                plm: self,
                kind: ReleaseKind::RoutingRelease,
            }),
            mboms: Box::new(FakeLifecycle {
                plm: self,
                kind: ReleaseKind::MbomRelease,
            }),
            baselines: Box::new(FakeLifecycle {
                plm: self,
                kind: ReleaseKind::BaselineRelease,
            }),
        }
    }
}

fn record(artifact: &Artifact) -> ArtifactRecord {
    ArtifactRecord {
        id: artifact.id.clone(),
        name: Some(artifact.id.to_uppercase()),
        state: artifact.state.clone(),
        mbom_id: artifact.mbom_id.clone(),
    }
}

fn take(list: &[Artifact], limit: u32, keep: impl Fn(&Artifact) -> bool) -> Vec<ArtifactRecord> {
    list.iter()
        .filter(|a| keep(a))
        .take(limit as usize)
        .map(record)
        .collect()
}

impl ItemDirectory for FakePlm {
    fn current_generation(&self, item_id: &str) -> Result<Option<u32>, CollaboratorError> {
        Ok(self.state.borrow().items.get(item_id).copied())
    }
}

impl CandidateSource for FakePlm {
    fn routings(
        &self,
        item_id: &str,
        mbom_ids: &[String],
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError> {
        Ok(take(&self.state.borrow().routings, limit, |a| {
            a.owner.as_deref() == Some(item_id)
                || a.mbom_id.as_ref().is_some_and(|m| mbom_ids.contains(m))
        }))
    }

    fn mboms(
        &self,
        source_item_id: &str,
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError> {
        Ok(take(&self.state.borrow().mboms, limit, |a| {
            a.owner.as_deref() == Some(source_item_id)
        }))
    }

    fn baselines(
        &self,
        root_item_id: &str,
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError> {
        Ok(take(&self.state.borrow().baselines, limit, |a| {
            a.owner.as_deref() == Some(root_item_id)
        }))
    }
}

impl ReleaseDiagnostics for FakePlm {
    fn diagnose(
        &self,
        kind: ReleaseKind,
        resource_id: &str,
        ruleset: &Ruleset,
    ) -> Result<Diagnostics, CollaboratorError> {
        let state = self.state.borrow();
        let mut diagnostics = Diagnostics::clean(kind, resource_id, &ruleset.id);
        let resource_type = kind.resource_type();

        let Some(artifact) = state.artifacts(kind).iter().find(|a| a.id == resource_id) else {
            diagnostics.errors.push(Issue::new(
                format!("{resource_type}_not_found"),
                format!("{resource_type} not found: {resource_id}"),
                format!("{resource_type}.exists"),
            ));
            return Ok(diagnostics);
        };

        let released_rule = format!("{resource_type}.not_already_released");
        if ruleset.contains(&released_rule) && is_released_state(&artifact.state) {
            diagnostics.errors.push(Issue::new(
                format!("{resource_type}_already_released"),
                format!("{resource_type} already released: {resource_id}"),
                released_rule,
            ));
        }

        let in_ruleset = |issue: &&Issue| ruleset.contains(&issue.rule_id);
        if let Some(errors) = state.errors.get(resource_id) {
            diagnostics
                .errors
                .extend(errors.iter().filter(in_ruleset).cloned());
        }
        if let Some(warnings) = state.warnings.get(resource_id) {
            diagnostics
                .warnings
                .extend(warnings.iter().filter(in_ruleset).cloned());
        }
        Ok(diagnostics)
    }
}

impl ManifestStore for FakePlm {
    fn manifest(
        &self,
        item_id: &str,
        generation: u32,
    ) -> Result<Option<EsignManifest>, CollaboratorError> {
        let mut state = self.state.borrow_mut();
        state.manifest_queries += 1;
        Ok(state
            .manifests
            .get(&(item_id.to_string(), generation))
            .cloned())
    }

    fn signatures(
        &self,
        item_id: &str,
        generation: u32,
    ) -> Result<Vec<Signature>, CollaboratorError> {
        Ok(self
            .state
            .borrow()
            .signatures
            .iter()
            .filter(|(item, item_generation, _)| item == item_id && *item_generation == generation)
            .map(|(_, _, sig)| sig.clone())
            .collect())
    }
}

struct FakeLifecycle<'a> {
    plm: &'a FakePlm,
    kind: ReleaseKind,
}

impl Lifecycle for FakeLifecycle<'_> {
    fn release(
        &self,
        resource_id: &str,
        _ctx: &TransitionContext<'_>,
    ) -> Result<String, TransitionError> {
        let mut state = self.plm.state.borrow_mut();
        if state.unavailable.contains(resource_id) {
            return Err(CollaboratorError::msg("store offline").into());
        }
        if let Some(message) = state.rejected.get(resource_id) {
            return Err(TransitionError::Rejected(message.clone()));
        }
        let artifact = state
            .artifact_mut(self.kind, resource_id)
            .ok_or_else(|| TransitionError::Rejected(format!("not found: {resource_id}")))?;
        if is_released_state(&artifact.state) {
            return Err(TransitionError::Rejected(format!(
                "{} already released",
                self.kind.resource_type()
            )));
        }
        artifact.state = "released".to_string();
        state.events.push(format!("release:{resource_id}"));
        Ok("released".to_string())
    }

    fn reopen(&self, resource_id: &str) -> Result<String, TransitionError> {
        let mut state = self.plm.state.borrow_mut();
        if state.unavailable.contains(resource_id) {
            return Err(CollaboratorError::msg("store offline").into());
        }
        if state.failing_reopens.contains(resource_id) {
            return Err(TransitionError::Rejected(format!(
                "cannot reopen {resource_id}"
            )));
        }
        let artifact = state
            .artifact_mut(self.kind, resource_id)
            .ok_or_else(|| TransitionError::Rejected(format!("not found: {resource_id}")))?;
        if !is_released_state(&artifact.state) {
            return Err(TransitionError::Rejected(format!(
                "{} is not released",
                self.kind.resource_type()
            )));
        }
        artifact.state = "draft".to_string();
        state.events.push(format!("reopen:{resource_id}"));
        Ok("draft".to_string())
    }
}
