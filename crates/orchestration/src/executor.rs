//! Execution engine - walks a plan, applies releases, compensates on abort

use crate::collaborators::{
    CollaboratorError, Collaborators, ProgressCallback, TransitionContext, TransitionError,
};
use crate::error::{Error, Result};
use crate::failpoint::{FailpointSet, INJECTED_MESSAGE};
use crate::gating::GatingEvaluator;
use crate::planner::PreparedPlan;
use crate::readiness;
use crate::rollback::{RollbackEntry, RollbackStack};
use crate::types::{
    ExecuteOptions, ExecutionResult, PlanStep, ReleaseKind, StepAction, StepRef, StepStatus,
};
use std::collections::BTreeSet;

/// Outcome of evaluating one step
struct StepOutcome {
    result: ExecutionResult,
    applied: Option<RollbackEntry>,
}

impl StepOutcome {
    fn unchanged(step: &PlanStep, status: StepStatus, message: Option<String>) -> Self {
        Self {
            result: ExecutionResult::forward(step, status, Some(step.state.clone()), message),
            applied: None,
        }
    }
}

/// Walks a prepared plan for one execute call
pub(crate) struct Executor<'a, 'c> {
    collab: &'a Collaborators<'c>,
    prepared: &'a PreparedPlan,
    options: &'a ExecuteOptions,
    failpoints: &'a FailpointSet,
}

impl<'a, 'c> Executor<'a, 'c> {
    pub fn new(
        collab: &'a Collaborators<'c>,
        prepared: &'a PreparedPlan,
        options: &'a ExecuteOptions,
        failpoints: &'a FailpointSet,
    ) -> Self {
        Self {
            collab,
            prepared,
            options,
            failpoints,
        }
    }

    /// Run every step; forward results first, then rollback results
    pub fn run<P: ProgressCallback + ?Sized>(&self, progress: &mut P) -> Result<Vec<ExecutionResult>> {
        let mut results = Vec::with_capacity(self.prepared.plan.steps.len());
        let mut stack = RollbackStack::new();
        let mut blocked: BTreeSet<StepRef> = BTreeSet::new();
        let mut aborted = false;

        for step in &self.prepared.plan.steps {
            progress.on_step_start(step);
            let outcome = self.evaluate(step, &blocked)?;
            progress.on_step_complete(&outcome.result);

            if let Some(entry) = outcome.applied {
                stack.push(entry);
            }

            let status = outcome.result.status;
            if status.is_blocking() || status == StepStatus::SkippedDependency {
                blocked.insert(step.step_ref());
            }
            results.push(outcome.result);

            if status.is_blocking() {
                if self.options.continue_on_error {
                    log::warn!("{} {}: {status}, continuing", step.kind, step.resource_id);
                } else {
                    log::warn!("{} {}: {status}, aborting run", step.kind, step.resource_id);
                    aborted = true;
                    break;
                }
            }
        }

        if aborted && self.options.rollback_on_failure && !stack.is_empty() {
            self.compensate(&mut stack, &mut results, progress)?;
        } else {
            stack.commit();
        }

        Ok(results)
    }

    fn evaluate(&self, step: &PlanStep, blocked: &BTreeSet<StepRef>) -> Result<StepOutcome> {
        if let Some(dependency) = step.depends_on.iter().find(|d| blocked.contains(*d)) {
            return Ok(StepOutcome::unchanged(
                step,
                StepStatus::SkippedDependency,
                Some(format!("Depends on blocked step {dependency}")),
            ));
        }

        if self.options.dry_run {
            return Ok(StepOutcome {
                result: ExecutionResult::forward(step, StepStatus::Planned, None, None),
                applied: None,
            });
        }

        match step.action {
            StepAction::SkipAlreadyReleased => {
                return Ok(StepOutcome::unchanged(
                    step,
                    StepStatus::SkippedAlreadyReleased,
                    None,
                ));
            }
            StepAction::RequiresEsign => {
                if let Some(message) = self.gate_message()? {
                    return Ok(StepOutcome::unchanged(
                        step,
                        StepStatus::BlockedEsignIncomplete,
                        Some(message),
                    ));
                }
                log::info!("E-sign gate for {} has cleared since planning", step.resource_id);
            }
            StepAction::Execute => {}
        }

        let force = step.kind == ReleaseKind::BaselineRelease && self.options.baseline_force;
        if let Some(ruleset) = self.prepared.rulesets.get(&step.kind) {
            let diagnostics = readiness::diagnose(self.collab, step.kind, &step.resource_id, ruleset)?;
            if !diagnostics.is_ok() {
                if force {
                    log::info!(
                        "Forcing baseline {} past {} diagnostic errors",
                        step.resource_id,
                        diagnostics.errors.len()
                    );
                } else {
                    let message = diagnostics
                        .errors
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Ok(StepOutcome::unchanged(
                        step,
                        StepStatus::BlockedDiagnostics,
                        Some(message),
                    ));
                }
            }
        }

        if let Some(key) = self.failpoints.matching(step.kind, &step.resource_id) {
            log::warn!("Failpoint '{key}' triggered for {} {}", step.kind, step.resource_id);
            return Ok(StepOutcome::unchanged(
                step,
                StepStatus::Failed,
                Some(INJECTED_MESSAGE.to_string()),
            ));
        }

        let ctx = TransitionContext {
            ruleset_id: &self.prepared.plan.ruleset_id,
            force,
        };
        match self.collab.lifecycle(step.kind).release(&step.resource_id, &ctx) {
            Ok(state) => {
                log::info!("Released {} {} ({} -> {state})", step.resource_type, step.resource_id, step.state);
                Ok(StepOutcome {
                    result: ExecutionResult::forward(
                        step,
                        StepStatus::Executed,
                        Some(state.clone()),
                        None,
                    ),
                    applied: Some(RollbackEntry {
                        kind: step.kind,
                        resource_id: step.resource_id.clone(),
                        state_before: step.state.clone(),
                        state_released: state,
                    }),
                })
            }
            Err(TransitionError::Rejected(message)) => {
                Ok(StepOutcome::unchanged(step, StepStatus::Failed, Some(message)))
            }
            Err(TransitionError::Unavailable(source)) => Err(Error::collaborator(
                format!("release {} {}", step.resource_type, step.resource_id),
                source,
            )),
        }
    }

    /// Blocked message when the gate is still closed, `None` once it is open
    fn gate_message(&self) -> Result<Option<String>> {
        let plan = &self.prepared.plan;
        let generation = self.prepared.generation;
        let gate = GatingEvaluator::new(self.collab.manifests);
        let load = |e: CollaboratorError| Error::collaborator("load e-sign manifest", e);

        if gate.is_complete(&plan.item_id, generation).map_err(load)? {
            return Ok(None);
        }
        Ok(gate
            .status(&plan.item_id, generation)
            .map_err(load)?
            .map(|s| s.blocked_message()))
    }

    fn compensate<P: ProgressCallback + ?Sized>(
        &self,
        stack: &mut RollbackStack,
        results: &mut Vec<ExecutionResult>,
        progress: &mut P,
    ) -> Result<()> {
        progress.on_rollback_start(stack.len());
        log::warn!("Rolling back {} released artifacts", stack.len());

        for entry in stack.drain_lifo() {
            let kind = entry.kind.reopen();
            match self.collab.lifecycle(entry.kind).reopen(&entry.resource_id) {
                Ok(state) => {
                    let result = ExecutionResult {
                        kind,
                        resource_type: entry.kind.resource_type().to_string(),
                        resource_id: entry.resource_id.clone(),
                        status: StepStatus::RolledBack,
                        state_before: Some(entry.state_released.clone()),
                        state_after: Some(state),
                        message: None,
                    };
                    progress.on_step_complete(&result);
                    results.push(result);
                }
                Err(err) => {
                    log::error!("Rollback of {} {} failed: {err}", entry.kind, entry.resource_id);
                    return Err(Error::RollbackFailed {
                        kind,
                        resource_id: entry.resource_id,
                        message: err.to_string(),
                        results: std::mem::take(results),
                    });
                }
            }
        }
        Ok(())
    }
}
