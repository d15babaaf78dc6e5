//! # Orchestration
//!
//! Coordinated release of manufacturing artifacts for a root item.
//!
//! Given an engineering item, the orchestrator discovers its routings,
//! manufacturing BOMs and baselines, plans their release in dependency
//! order, gates baseline releases behind a complete electronic-signature
//! manifest, and on failure reopens what it already released, last in
//! first out.
//!
//! ## Core Concepts
//!
//! - **Ruleset**: named list of validation rule ids per release kind
//! - **Plan**: ordered steps with an action each, plus a readiness report
//! - **Gate**: e-sign manifest completeness for the item's current generation
//! - **Rollback stack**: applied releases, drained LIFO when a run aborts
//!
//! ## Example
//!
//! ```ignore
//! use orchestration::{ExecuteOptions, ReleaseOrchestrator, RulesetRegistry};
//!
//! let orchestrator = ReleaseOrchestrator::new(RulesetRegistry::builtin());
//! let collab = store.collaborators();
//!
//! let plan = orchestrator.plan(&collab, "part-100")?;
//! for step in &plan.steps {
//!     println!("{} {} -> {}", step.kind, step.resource_id, step.action);
//! }
//!
//! let report = orchestrator.execute(
//!     &collab,
//!     "part-100",
//!     &ExecuteOptions {
//!         include_baselines: true,
//!         rollback_on_failure: true,
//!         ..Default::default()
//!     },
//! )?;
//! ```
//!
//! ## Collaborator Traits
//!
//! The crate owns no artifact state; it works through traits:
//!
//! - [`ItemDirectory`]: item existence and current generation
//! - [`CandidateSource`]: routings, MBOMs and baselines of an item
//! - [`ReleaseDiagnostics`]: per-resource rule evaluation
//! - [`ManifestStore`]: e-sign manifests and signatures
//! - [`Lifecycle`]: release and reopen transitions, one per kind
//! - [`ProgressCallback`]: receives progress updates during execute

pub mod collaborators;
pub mod error;
mod executor;
pub mod failpoint;
pub mod gating;
pub mod orchestrator;
pub mod planner;
pub mod readiness;
pub mod registry;
pub mod resolver;
pub mod rollback;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use collaborators::{
    ArtifactRecord, CandidateSource, CollaboratorError, Collaborators, EsignManifest,
    ItemDirectory, Lifecycle, ManifestStore, NoProgress, ProgressCallback, ReleaseDiagnostics,
    Signature, SignatureRequirement, TransitionContext, TransitionError,
};
pub use error::{Error, ErrorCategory, Result};
pub use failpoint::{FAILPOINTS_ENV, FailpointSet};
pub use gating::{GatingEvaluator, ManifestStatus, RequirementStatus};
pub use orchestrator::ReleaseOrchestrator;
pub use registry::{
    KindListing, Ruleset, RulesetConfig, RulesetListing, RulesetRegistry, RulesetSource,
    allowed_rules, existence_rule,
};
pub use rollback::{RollbackEntry, RollbackStack};
pub use types::{
    DEFAULT_LIMIT, DEFAULT_RULESET, Diagnostics, ExecuteOptions, ExecuteSummary, ExecutionReport,
    ExecutionResult, Issue, KindSummary, Limits, MAX_LIMIT, Plan, PlanRequest, PlanStep,
    Readiness, ReadinessSummary, ReleaseCandidate, ReleaseKind, ResourceReadiness, ResultKind,
    StepAction, StepRef, StepStatus, is_released_state,
};
