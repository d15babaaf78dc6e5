//! Collaborator contracts and provider traits
//!
//! The orchestrator owns no artifact state. Everything it reads or
//! mutates goes through these traits, so the engine can run against a
//! SQLite store, an in-memory fake, or anything else that implements them.

use crate::registry::Ruleset;
use crate::types::{Diagnostics, ExecutionResult, Plan, PlanStep, ReleaseKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// Opaque failure of a collaborator (storage, I/O)
#[derive(Debug, Error)]
#[error(transparent)]
pub struct CollaboratorError(Box<dyn StdError + Send + Sync>);

impl CollaboratorError {
    /// Wrap any error
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }

    /// Error carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

/// Failure of a lifecycle transition
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The artifact refused the transition; blocking, not fatal
    #[error("{0}")]
    Rejected(String),
    /// The store could not serve the transition; fatal for the call
    #[error(transparent)]
    Unavailable(#[from] CollaboratorError),
}

/// One artifact row as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub name: Option<String>,
    pub state: String,
    /// Owning MBOM, for routings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbom_id: Option<String>,
}

/// One required or optional signature slot of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequirement {
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// E-sign manifest for an item generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsignManifest {
    pub id: String,
    pub item_id: String,
    pub generation: u32,
    pub requirements: Vec<SignatureRequirement>,
}

/// A captured signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub id: String,
    pub meaning: String,
    pub signer: String,
    pub signed_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Context passed to forward transitions
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub ruleset_id: &'a str,
    /// Only meaningful for baselines
    pub force: bool,
}

/// Item lookups
pub trait ItemDirectory {
    /// Current generation of an item, or `None` if it does not exist
    fn current_generation(&self, item_id: &str) -> Result<Option<u32>, CollaboratorError>;
}

/// Candidate discovery
pub trait CandidateSource {
    /// Routings owned by the item or attached to one of `mbom_ids`
    fn routings(
        &self,
        item_id: &str,
        mbom_ids: &[String],
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError>;

    /// MBOMs whose source item is `source_item_id`
    fn mboms(
        &self,
        source_item_id: &str,
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError>;

    /// Baselines rooted at `root_item_id`
    fn baselines(
        &self,
        root_item_id: &str,
        limit: u32,
    ) -> Result<Vec<ArtifactRecord>, CollaboratorError>;
}

/// Per-resource release diagnostics
pub trait ReleaseDiagnostics {
    fn diagnose(
        &self,
        kind: ReleaseKind,
        resource_id: &str,
        ruleset: &Ruleset,
    ) -> Result<Diagnostics, CollaboratorError>;
}

/// E-sign manifests and signatures
pub trait ManifestStore {
    fn manifest(
        &self,
        item_id: &str,
        generation: u32,
    ) -> Result<Option<EsignManifest>, CollaboratorError>;

    fn signatures(
        &self,
        item_id: &str,
        generation: u32,
    ) -> Result<Vec<Signature>, CollaboratorError>;
}

/// Forward and compensating transitions for one artifact kind
pub trait Lifecycle {
    /// Release the artifact; returns its new lifecycle value
    fn release(&self, resource_id: &str, ctx: &TransitionContext<'_>)
    -> Result<String, TransitionError>;

    /// Reopen a released artifact; returns its reverted lifecycle value
    fn reopen(&self, resource_id: &str) -> Result<String, TransitionError>;
}

/// Everything the orchestrator consumes, bundled for one call
pub struct Collaborators<'a> {
    pub items: &'a dyn ItemDirectory,
    pub candidates: &'a dyn CandidateSource,
    pub diagnostics: &'a dyn ReleaseDiagnostics,
    pub manifests: &'a dyn ManifestStore,
    pub routings: Box<dyn Lifecycle + 'a>,
    pub mboms: Box<dyn Lifecycle + 'a>,
    pub baselines: Box<dyn Lifecycle + 'a>,
}

impl Collaborators<'_> {
    /// Lifecycle responsible for `kind`
    pub fn lifecycle(&self, kind: ReleaseKind) -> &dyn Lifecycle {
        match kind {
            ReleaseKind::RoutingRelease => self.routings.as_ref(),
            ReleaseKind::MbomRelease => self.mboms.as_ref(),
            ReleaseKind::BaselineRelease => self.baselines.as_ref(),
        }
    }
}

/// Progress callback for execution
///
/// Implement this trait to receive progress updates during execute.
pub trait ProgressCallback {
    /// Called once the plan has been recomputed
    fn on_plan_ready(&mut self, plan: &Plan);

    /// Called before a step is evaluated
    fn on_step_start(&mut self, step: &PlanStep);

    /// Called for every forward or rollback result
    fn on_step_complete(&mut self, result: &ExecutionResult);

    /// Called when compensation begins
    fn on_rollback_start(&mut self, count: usize);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_plan_ready(&mut self, _plan: &Plan) {}
    fn on_step_start(&mut self, _step: &PlanStep) {}
    fn on_step_complete(&mut self, _result: &ExecutionResult) {}
    fn on_rollback_start(&mut self, _count: usize) {}
}
