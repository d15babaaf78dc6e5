//! Core types for release orchestration

use crate::gating::ManifestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Largest per-class candidate limit accepted by plan and execute
pub const MAX_LIMIT: u32 = 200;

/// Default per-class candidate limit
pub const DEFAULT_LIMIT: u32 = 20;

/// Default ruleset used when the caller does not name one
pub const DEFAULT_RULESET: &str = "default";

/// Kind of forward release step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// Release of a routing
    RoutingRelease,
    /// Release of a manufacturing BOM
    MbomRelease,
    /// Release of a baseline
    BaselineRelease,
}

impl ReleaseKind {
    /// All kinds in forward dependency order
    pub const ALL: [Self; 3] = [Self::RoutingRelease, Self::MbomRelease, Self::BaselineRelease];

    /// Wire name of the kind (e.g. "routing_release")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutingRelease => "routing_release",
            Self::MbomRelease => "mbom_release",
            Self::BaselineRelease => "baseline_release",
        }
    }

    /// Resource type the kind operates on
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::RoutingRelease => "routing",
            Self::MbomRelease => "mbom",
            Self::BaselineRelease => "baseline",
        }
    }

    /// Forward ordering rank; lower runs first
    pub fn rank(&self) -> u8 {
        match self {
            Self::RoutingRelease => 10,
            Self::MbomRelease => 20,
            Self::BaselineRelease => 30,
        }
    }

    /// The compensating kind recorded when a release is rolled back
    pub fn reopen(&self) -> ResultKind {
        match self {
            Self::RoutingRelease => ResultKind::RoutingReopen,
            Self::MbomRelease => ResultKind::MbomReopen,
            Self::BaselineRelease => ResultKind::BaselineReopen,
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "routing_release" | "routing" => Ok(Self::RoutingRelease),
            "mbom_release" | "mbom" => Ok(Self::MbomRelease),
            "baseline_release" | "baseline" => Ok(Self::BaselineRelease),
            other => Err(format!("unknown release kind: {other}")),
        }
    }
}

/// Kind recorded on an execution result: a forward release or its reopen counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    RoutingRelease,
    MbomRelease,
    BaselineRelease,
    RoutingReopen,
    MbomReopen,
    BaselineReopen,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutingRelease => "routing_release",
            Self::MbomRelease => "mbom_release",
            Self::BaselineRelease => "baseline_release",
            Self::RoutingReopen => "routing_reopen",
            Self::MbomReopen => "mbom_reopen",
            Self::BaselineReopen => "baseline_reopen",
        }
    }

    /// Whether this is a compensating (reopen) kind
    pub fn is_reopen(&self) -> bool {
        matches!(
            self,
            Self::RoutingReopen | Self::MbomReopen | Self::BaselineReopen
        )
    }
}

impl From<ReleaseKind> for ResultKind {
    fn from(kind: ReleaseKind) -> Self {
        match kind {
            ReleaseKind::RoutingRelease => Self::RoutingRelease,
            ReleaseKind::MbomRelease => Self::MbomRelease,
            ReleaseKind::BaselineRelease => Self::BaselineRelease,
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when a lifecycle value denotes a released artifact
pub fn is_released_state(state: &str) -> bool {
    state.trim().eq_ignore_ascii_case("released")
}

/// Identity of a step within one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepRef {
    pub kind: ReleaseKind,
    pub resource_id: String,
}

impl StepRef {
    pub fn new(kind: ReleaseKind, resource_id: impl Into<String>) -> Self {
        Self {
            kind,
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.resource_id)
    }
}

/// One manufacturing artifact eligible for release in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub kind: ReleaseKind,
    pub resource_id: String,
    pub name: Option<String>,
    /// Artifact-owned lifecycle value (e.g. "draft", "released")
    pub state: String,
    /// Steps that must be in their final state before this one
    pub depends_on: Vec<StepRef>,
}

impl ReleaseCandidate {
    pub fn step_ref(&self) -> StepRef {
        StepRef::new(self.kind, self.resource_id.clone())
    }

    pub fn is_released(&self) -> bool {
        is_released_state(&self.state)
    }
}

/// A single validation finding for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Issue {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        rule_id: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            rule_id: rule_id.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Release diagnostics for one resource under one ruleset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub resource_type: String,
    pub resource_id: String,
    pub ruleset_id: String,
    #[serde(default)]
    pub errors: Vec<Issue>,
    #[serde(default)]
    pub warnings: Vec<Issue>,
}

impl Diagnostics {
    /// Diagnostics with no findings
    pub fn clean(kind: ReleaseKind, resource_id: &str, ruleset_id: &str) -> Self {
        Self {
            resource_type: kind.resource_type().to_string(),
            resource_id: resource_id.to_string(),
            ruleset_id: ruleset_id.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Action the plan dictates for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Release directly
    Execute,
    /// Release only once the e-sign manifest is complete
    RequiresEsign,
    /// Artifact is already released; nothing to do
    SkipAlreadyReleased,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::RequiresEsign => "requires_esign",
            Self::SkipAlreadyReleased => "skip_already_released",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered step of a release plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub kind: ReleaseKind,
    pub resource_type: String,
    pub resource_id: String,
    pub name: Option<String>,
    pub state: String,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<StepRef>,
    /// Readiness snapshot for this resource at plan time
    pub diagnostics: Diagnostics,
}

impl PlanStep {
    pub fn step_ref(&self) -> StepRef {
        StepRef::new(self.kind, self.resource_id.clone())
    }
}

/// Per-kind readiness counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    pub resources: usize,
    pub ok_resources: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Readiness counters across all resources of an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub ok: bool,
    pub resources: usize,
    pub ok_resources: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub by_kind: BTreeMap<String, KindSummary>,
}

/// Readiness of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReadiness {
    pub kind: ReleaseKind,
    pub resource_id: String,
    pub name: Option<String>,
    pub state: String,
    pub diagnostics: Diagnostics,
}

/// Readiness report for a root item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub item_id: String,
    pub ruleset_id: String,
    pub summary: ReadinessSummary,
    pub resources: Vec<ResourceReadiness>,
    /// Every error across all resources, in resource order
    pub errors: Vec<Issue>,
    pub esign_manifest: Option<ManifestStatus>,
}

/// A release plan for a root item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub item_id: String,
    pub ruleset_id: String,
    pub readiness: Readiness,
    pub steps: Vec<PlanStep>,
    /// BLAKE3 over steps and readiness; equal for equal plans
    pub fingerprint: String,
}

/// Per-class candidate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub routing: u32,
    pub mbom: u32,
    pub baseline: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            routing: DEFAULT_LIMIT,
            mbom: DEFAULT_LIMIT,
            baseline: DEFAULT_LIMIT,
        }
    }
}

/// Inputs to plan construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub ruleset_id: String,
    pub include_routings: bool,
    pub include_mboms: bool,
    pub include_baselines: bool,
    pub limits: Limits,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            ruleset_id: DEFAULT_RULESET.to_string(),
            include_routings: true,
            include_mboms: true,
            include_baselines: true,
            limits: Limits::default(),
        }
    }
}

impl PlanRequest {
    /// Plan request with every class included under the given ruleset
    pub fn with_ruleset(ruleset_id: impl Into<String>) -> Self {
        Self {
            ruleset_id: ruleset_id.into(),
            ..Self::default()
        }
    }

    /// Whether candidates of `kind` are in scope
    pub fn includes(&self, kind: ReleaseKind) -> bool {
        match kind {
            ReleaseKind::RoutingRelease => self.include_routings,
            ReleaseKind::MbomRelease => self.include_mboms,
            ReleaseKind::BaselineRelease => self.include_baselines,
        }
    }

    /// Included kinds in forward order
    pub fn kinds(&self) -> Vec<ReleaseKind> {
        ReleaseKind::ALL
            .into_iter()
            .filter(|kind| self.includes(*kind))
            .collect()
    }
}

/// Options for an execute call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    pub include_routings: bool,
    pub include_mboms: bool,
    pub include_baselines: bool,
    pub ruleset_id: String,
    /// Report intended actions without mutating anything
    pub dry_run: bool,
    /// Reopen already-released artifacts (LIFO) when the run aborts
    pub rollback_on_failure: bool,
    /// Keep attempting independent steps after a blocking condition
    pub continue_on_error: bool,
    /// Relax baseline diagnostics; never bypasses the e-sign gate
    pub baseline_force: bool,
    pub routing_limit: u32,
    pub mbom_limit: u32,
    pub baseline_limit: u32,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            include_routings: true,
            include_mboms: true,
            include_baselines: false,
            ruleset_id: DEFAULT_RULESET.to_string(),
            dry_run: false,
            rollback_on_failure: false,
            continue_on_error: false,
            baseline_force: false,
            routing_limit: DEFAULT_LIMIT,
            mbom_limit: DEFAULT_LIMIT,
            baseline_limit: DEFAULT_LIMIT,
        }
    }
}

impl ExecuteOptions {
    /// Ruleset id with surrounding whitespace removed; blank means default
    pub fn effective_ruleset(&self) -> &str {
        let trimmed = self.ruleset_id.trim();
        if trimmed.is_empty() {
            DEFAULT_RULESET
        } else {
            trimmed
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            routing: self.routing_limit,
            mbom: self.mbom_limit,
            baseline: self.baseline_limit,
        }
    }

    /// The plan request an execute call recomputes its plan with
    pub fn plan_request(&self) -> PlanRequest {
        PlanRequest {
            ruleset_id: self.effective_ruleset().to_string(),
            include_routings: self.include_routings,
            include_mboms: self.include_mboms,
            include_baselines: self.include_baselines,
            limits: self.limits(),
        }
    }
}

/// Outcome of one step of an execute call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Dry run: the step would be attempted
    Planned,
    /// Forward transition applied
    Executed,
    /// Artifact was already released before the run
    SkippedAlreadyReleased,
    /// E-sign manifest still incomplete
    BlockedEsignIncomplete,
    /// Release diagnostics reported errors
    BlockedDiagnostics,
    /// The artifact rejected the transition
    Failed,
    /// A step this one depends on was blocked
    SkippedDependency,
    /// Compensated by reopening the artifact
    RolledBack,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Executed => "executed",
            Self::SkippedAlreadyReleased => "skipped_already_released",
            Self::BlockedEsignIncomplete => "blocked_esign_incomplete",
            Self::BlockedDiagnostics => "blocked_diagnostics",
            Self::Failed => "failed",
            Self::SkippedDependency => "skipped_dependency",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Whether this status halts the run under fail-fast
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::BlockedEsignIncomplete | Self::BlockedDiagnostics | Self::Failed
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one forward or compensating step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: ResultKind,
    pub resource_type: String,
    pub resource_id: String,
    pub status: StepStatus,
    pub state_before: Option<String>,
    pub state_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionResult {
    /// Result for a forward step
    pub fn forward(
        step: &PlanStep,
        status: StepStatus,
        state_after: Option<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            kind: step.kind.into(),
            resource_type: step.resource_type.clone(),
            resource_id: step.resource_id.clone(),
            status,
            state_before: Some(step.state.clone()),
            state_after,
            message,
        }
    }

    /// `kind:status` label, e.g. "mbom_reopen:rolled_back"
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.status)
    }
}

/// Counts of execution results by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub planned: usize,
    pub executed: usize,
    pub skipped: usize,
    pub blocked: usize,
    pub failed: usize,
    pub rolled_back: usize,
}

impl ExecuteSummary {
    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ExecutionResult) {
        match result.status {
            StepStatus::Planned => self.planned += 1,
            StepStatus::Executed => self.executed += 1,
            StepStatus::SkippedAlreadyReleased | StepStatus::SkippedDependency => {
                self.skipped += 1;
            }
            StepStatus::BlockedEsignIncomplete | StepStatus::BlockedDiagnostics => {
                self.blocked += 1;
            }
            StepStatus::Failed => self.failed += 1,
            StepStatus::RolledBack => self.rolled_back += 1,
        }
    }

    /// A run is clean when nothing blocked, failed or had to be compensated
    pub fn is_success(&self) -> bool {
        self.blocked == 0 && self.failed == 0 && self.rolled_back == 0
    }
}

/// Report returned by an execute call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub item_id: String,
    pub ruleset_id: String,
    pub dry_run: bool,
    pub generated_at: DateTime<Utc>,
    /// Forward results in execution order, then rollback results (LIFO)
    pub results: Vec<ExecutionResult>,
    /// Readiness recomputed after the run, when it could be computed
    pub post_readiness: Option<Readiness>,
}

impl ExecutionReport {
    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for result in &self.results {
            summary.add_result(result);
        }
        summary
    }

    /// Result for a given kind and resource, if any
    pub fn find(&self, kind: ResultKind, resource_id: &str) -> Option<&ExecutionResult> {
        self.results
            .iter()
            .find(|r| r.kind == kind && r.resource_id == resource_id)
    }

    /// `kind:status` labels in result order
    pub fn labels(&self) -> Vec<String> {
        self.results.iter().map(ExecutionResult::label).collect()
    }
}
