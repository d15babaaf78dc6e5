//! Release orchestrator - the public plan / execute entry points

use crate::collaborators::{Collaborators, NoProgress, ProgressCallback};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::failpoint::FailpointSet;
use crate::planner::{self, validate_limits};
use crate::registry::RulesetRegistry;
use crate::types::{ExecuteOptions, ExecutionReport, Plan, PlanRequest};
use chrono::Utc;

/// Plans and executes coordinated releases for a root item
#[derive(Debug, Clone, Default)]
pub struct ReleaseOrchestrator {
    registry: RulesetRegistry,
    failpoints: FailpointSet,
}

impl ReleaseOrchestrator {
    pub fn new(registry: RulesetRegistry) -> Self {
        Self {
            registry,
            failpoints: FailpointSet::disabled(),
        }
    }

    /// Honor the given failpoints during execute
    pub fn with_failpoints(mut self, failpoints: FailpointSet) -> Self {
        self.failpoints = failpoints;
        self
    }

    pub fn registry(&self) -> &RulesetRegistry {
        &self.registry
    }

    /// Plan with every class included under the default ruleset
    pub fn plan(&self, collab: &Collaborators<'_>, item_id: &str) -> Result<Plan> {
        self.plan_with(collab, item_id, &PlanRequest::default())
    }

    /// Plan with an explicit request
    pub fn plan_with(
        &self,
        collab: &Collaborators<'_>,
        item_id: &str,
        request: &PlanRequest,
    ) -> Result<Plan> {
        planner::build(collab, &self.registry, item_id, request)
    }

    /// Check execute options without touching any collaborator
    pub fn validate(&self, options: &ExecuteOptions) -> Result<()> {
        let request = options.plan_request();
        self.registry
            .resolve_all(&request.kinds(), &request.ruleset_id)?;
        if options.rollback_on_failure && options.continue_on_error {
            return Err(Error::InvalidOptionCombination(
                "rollback_on_failure requires continue_on_error=false".to_string(),
            ));
        }
        validate_limits(&request.limits)
    }

    /// Recompute the plan and apply it
    pub fn execute(
        &self,
        collab: &Collaborators<'_>,
        item_id: &str,
        options: &ExecuteOptions,
    ) -> Result<ExecutionReport> {
        self.execute_with_progress(collab, item_id, options, &mut NoProgress)
    }

    /// Recompute the plan and apply it, reporting progress
    pub fn execute_with_progress(
        &self,
        collab: &Collaborators<'_>,
        item_id: &str,
        options: &ExecuteOptions,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ExecutionReport> {
        self.validate(options)?;

        let request = options.plan_request();
        let prepared = planner::prepare(collab, &self.registry, item_id, &request)?;
        progress.on_plan_ready(&prepared.plan);

        log::info!(
            "Executing {} steps for {item_id}{}",
            prepared.plan.steps.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let results =
            Executor::new(collab, &prepared, options, &self.failpoints).run(progress)?;

        let post_readiness = match planner::build(collab, &self.registry, item_id, &request) {
            Ok(plan) => Some(plan.readiness),
            Err(err) => {
                log::warn!("Post-run readiness unavailable for {item_id}: {err}");
                None
            }
        };

        Ok(ExecutionReport {
            item_id: item_id.to_string(),
            ruleset_id: prepared.plan.ruleset_id,
            dry_run: options.dry_run,
            generated_at: Utc::now(),
            results,
            post_readiness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RulesetConfig;
    use crate::testing::FakePlm;
    use crate::types::{
        ExecutionResult, Issue, PlanStep, ResultKind, StepAction, StepStatus,
    };
    use std::collections::BTreeMap;

    /// Root item with one routing attached to one MBOM and one baseline
    fn chain() -> FakePlm {
        let plm = FakePlm::new();
        plm.add_item("part-1", 1);
        plm.add_routing("rt-1", Some("part-1"), Some("mbom-1"), "draft");
        plm.add_mbom("mbom-1", "part-1", "draft");
        plm.add_baseline("bl-1", "part-1", "draft");
        plm
    }

    fn with_baselines() -> ExecuteOptions {
        ExecuteOptions {
            include_baselines: true,
            ..Default::default()
        }
    }

    fn run(plm: &FakePlm, options: &ExecuteOptions) -> Result<ExecutionReport> {
        ReleaseOrchestrator::default().execute(&plm.collaborators(), "part-1", options)
    }

    #[test]
    fn test_repeated_plans_are_equal() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let orchestrator = ReleaseOrchestrator::default();
        let collab = plm.collaborators();
        let first = orchestrator.plan(&collab, "part-1").unwrap();
        let second = orchestrator.plan(&collab, "part-1").unwrap();
        assert_eq!(first, second);
        assert!(plm.events().is_empty());
    }

    #[test]
    fn test_baseline_without_manifest_executes() {
        let plm = chain();
        let report = run(&plm, &with_baselines()).unwrap();
        assert_eq!(
            report.labels(),
            vec![
                "routing_release:executed",
                "mbom_release:executed",
                "baseline_release:executed",
            ]
        );
        let baseline = report
            .find(ResultKind::BaselineRelease, "bl-1")
            .unwrap();
        assert_eq!(baseline.state_before.as_deref(), Some("draft"));
        assert_eq!(baseline.state_after.as_deref(), Some("released"));
        assert_eq!(plm.state_of("bl-1"), "released");
        assert!(report.summary().is_success());
        assert!(report.post_readiness.is_some());
    }

    #[test]
    fn test_incomplete_manifest_blocks_baseline() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved", "released"]);
        let report = run(&plm, &with_baselines()).unwrap();

        let baseline = report
            .find(ResultKind::BaselineRelease, "bl-1")
            .unwrap();
        assert_eq!(baseline.status, StepStatus::BlockedEsignIncomplete);
        assert_eq!(baseline.state_after.as_deref(), Some("draft"));
        assert_eq!(
            baseline.message.as_deref(),
            Some(
                "Electronic signature manifest incomplete; missing required meanings: approved, released"
            )
        );
        assert_eq!(plm.state_of("bl-1"), "draft");
        // fail-fast without rollback keeps earlier releases
        assert_eq!(plm.state_of("rt-1"), "released");
        assert_eq!(plm.state_of("mbom-1"), "released");
    }

    #[test]
    fn test_signing_clears_gate_on_next_execute() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let first = run(&plm, &with_baselines()).unwrap();
        assert_eq!(
            first.results.last().unwrap().status,
            StepStatus::BlockedEsignIncomplete
        );

        plm.sign("part-1", 1, "approved");
        let second = run(&plm, &with_baselines()).unwrap();
        assert_eq!(
            second.labels(),
            vec![
                "routing_release:skipped_already_released",
                "mbom_release:skipped_already_released",
                "baseline_release:executed",
            ]
        );
        let baseline = second.results.last().unwrap();
        assert!(baseline.state_after.as_deref().unwrap().contains("released"));
    }

    #[test]
    fn test_rollback_order_after_gate_block() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let options = ExecuteOptions {
            rollback_on_failure: true,
            ..with_baselines()
        };
        let report = run(&plm, &options).unwrap();
        assert_eq!(
            report.labels(),
            vec![
                "routing_release:executed",
                "mbom_release:executed",
                "baseline_release:blocked_esign_incomplete",
                "mbom_reopen:rolled_back",
                "routing_reopen:rolled_back",
            ]
        );
        let reopen = &report.results[3];
        assert_eq!(reopen.state_before.as_deref(), Some("released"));
        assert_eq!(reopen.state_after.as_deref(), Some("draft"));
        assert_eq!(plm.state_of("rt-1"), "draft");
        assert_eq!(plm.state_of("mbom-1"), "draft");
        assert_eq!(
            plm.events(),
            vec![
                "release:rt-1",
                "release:mbom-1",
                "reopen:mbom-1",
                "reopen:rt-1"
            ]
        );
        assert_eq!(report.summary().rolled_back, 2);
    }

    #[test]
    fn test_dry_run_reports_only_planned() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let options = ExecuteOptions {
            dry_run: true,
            rollback_on_failure: true,
            ..with_baselines()
        };
        let report = run(&plm, &options).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.results.len(), 3);
        for result in &report.results {
            assert_eq!(result.status, StepStatus::Planned);
            assert_eq!(result.state_after, None);
        }
        assert!(plm.events().is_empty());
        // manifest read once for the plan and once for post-run readiness; never by the gate
        assert_eq!(plm.manifest_queries(), 2);
    }

    #[test]
    fn test_unknown_ruleset_rejected_without_mutation() {
        let plm = chain();
        let options = ExecuteOptions {
            ruleset_id: "strict".into(),
            ..with_baselines()
        };
        let err = run(&plm, &options).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().starts_with("Unknown release ruleset"));
        assert!(plm.events().is_empty());
    }

    #[test]
    fn test_rollback_with_continue_rejected() {
        let plm = chain();
        let options = ExecuteOptions {
            rollback_on_failure: true,
            continue_on_error: true,
            ..Default::default()
        };
        let err = run(&plm, &options).unwrap_err();
        assert!(matches!(err, Error::InvalidOptionCombination(_)));
        assert_eq!(
            err.to_string(),
            "rollback_on_failure requires continue_on_error=false"
        );
        assert!(plm.events().is_empty());
        assert_eq!(plm.manifest_queries(), 0);
    }

    #[test]
    fn test_baseline_force_does_not_open_gate() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let options = ExecuteOptions {
            baseline_force: true,
            ..with_baselines()
        };
        let report = run(&plm, &options).unwrap();
        let baseline = report
            .find(ResultKind::BaselineRelease, "bl-1")
            .unwrap();
        assert_eq!(baseline.status, StepStatus::BlockedEsignIncomplete);
        assert_eq!(plm.state_of("bl-1"), "draft");
    }

    #[test]
    fn test_baseline_force_relaxes_diagnostics() {
        let plm = chain();
        plm.set_errors(
            "bl-1",
            vec![Issue::new(
                "baseline_member_missing",
                "Member part-9 does not exist",
                "baseline.members_references_exist",
            )],
        );

        let report = run(&plm, &with_baselines()).unwrap();
        let baseline = report.results.last().unwrap();
        assert_eq!(baseline.status, StepStatus::BlockedDiagnostics);
        assert_eq!(
            baseline.message.as_deref(),
            Some("Member part-9 does not exist")
        );

        let options = ExecuteOptions {
            baseline_force: true,
            ..with_baselines()
        };
        let report = run(&plm, &options).unwrap();
        assert_eq!(
            report.results.last().unwrap().status,
            StepStatus::Executed
        );
    }

    // Recording dependents as skipped_dependency (rather than omitting them)
    // is unconfirmed upstream behavior; revisit if the PLM service disagrees.
    #[test]
    fn test_continue_on_error_skips_dependents() {
        let plm = chain();
        plm.add_routing("rt-2", Some("part-1"), None, "draft");
        plm.reject_release("rt-1", "routing has no operations");

        let options = ExecuteOptions {
            continue_on_error: true,
            ..with_baselines()
        };
        let report = run(&plm, &options).unwrap();
        assert_eq!(
            report.labels(),
            vec![
                "routing_release:failed",
                "routing_release:executed",
                "mbom_release:skipped_dependency",
                "baseline_release:skipped_dependency",
            ]
        );
        assert_eq!(
            report.results[0].message.as_deref(),
            Some("routing has no operations")
        );
        assert_eq!(plm.events(), vec!["release:rt-2"]);
        assert!(!report.results.iter().any(|r| r.kind.is_reopen()));
    }

    #[test]
    fn test_failpoint_drives_rollback() {
        let plm = chain();
        let orchestrator =
            ReleaseOrchestrator::default().with_failpoints(FailpointSet::enabled(["mbom:mbom-1"]));
        let options = ExecuteOptions {
            rollback_on_failure: true,
            ..Default::default()
        };
        let report = orchestrator
            .execute(&plm.collaborators(), "part-1", &options)
            .unwrap();
        assert_eq!(
            report.labels(),
            vec![
                "routing_release:executed",
                "mbom_release:failed",
                "routing_reopen:rolled_back",
            ]
        );
        assert_eq!(
            report.results[1].message.as_deref(),
            Some("Injected failure via failpoint")
        );
        assert_eq!(plm.state_of("rt-1"), "draft");
        assert_eq!(plm.state_of("mbom-1"), "draft");
    }

    #[test]
    fn test_failed_reopen_is_fatal_with_partial_results() {
        let plm = chain();
        plm.fail_reopen("rt-1");
        let orchestrator =
            ReleaseOrchestrator::default().with_failpoints(FailpointSet::enabled(["mbom:mbom-1"]));
        let options = ExecuteOptions {
            rollback_on_failure: true,
            ..Default::default()
        };
        let err = orchestrator
            .execute(&plm.collaborators(), "part-1", &options)
            .unwrap_err();
        match err {
            Error::RollbackFailed {
                kind,
                resource_id,
                results,
                ..
            } => {
                assert_eq!(kind, ResultKind::RoutingReopen);
                assert_eq!(resource_id, "rt-1");
                let labels: Vec<String> = results.iter().map(ExecutionResult::label).collect();
                assert_eq!(
                    labels,
                    vec!["routing_release:executed", "mbom_release:failed"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(plm.state_of("rt-1"), "released");
    }

    #[test]
    fn test_storage_failure_is_fatal() {
        let plm = chain();
        plm.make_unavailable("mbom-1");
        let err = run(&plm, &ExecuteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_already_released_is_skipped_and_never_rolled_back() {
        let plm = FakePlm::new();
        plm.add_item("part-1", 1);
        plm.add_routing("rt-1", Some("part-1"), None, "released");
        plm.add_routing("rt-2", Some("part-1"), None, "draft");
        plm.add_mbom("mbom-1", "part-1", "draft");
        plm.reject_release("mbom-1", "MBOM has no lines");

        let options = ExecuteOptions {
            rollback_on_failure: true,
            ..Default::default()
        };
        let report = run(&plm, &options).unwrap();
        assert_eq!(
            report.labels(),
            vec![
                "routing_release:skipped_already_released",
                "routing_release:executed",
                "mbom_release:failed",
                "routing_reopen:rolled_back",
            ]
        );
        assert_eq!(report.results[3].resource_id, "rt-2");
        assert_eq!(plm.state_of("rt-1"), "released");
    }

    #[test]
    fn test_excluded_class_is_invisible() {
        let plm = chain();
        let options = ExecuteOptions {
            include_mboms: false,
            ..Default::default()
        };
        let report = run(&plm, &options).unwrap();
        assert_eq!(report.labels(), vec!["routing_release:executed"]);
        assert_eq!(plm.state_of("mbom-1"), "draft");
    }

    #[test]
    fn test_ruleset_checked_only_for_included_kinds() {
        let mut rulesets = BTreeMap::new();
        rulesets.insert("routing-only".to_string(), vec!["routing.has_operations".to_string()]);
        let mut config: RulesetConfig = BTreeMap::new();
        config.insert("routing_release".to_string(), rulesets);
        let orchestrator =
            ReleaseOrchestrator::new(RulesetRegistry::with_configured(&config).unwrap());

        let plm = chain();
        let options = ExecuteOptions {
            ruleset_id: " routing-only ".into(),
            include_mboms: false,
            ..Default::default()
        };
        let report = orchestrator
            .execute(&plm.collaborators(), "part-1", &options)
            .unwrap();
        assert_eq!(report.ruleset_id, "routing-only");
        assert_eq!(report.labels(), vec!["routing_release:executed"]);

        let options = ExecuteOptions {
            ruleset_id: "routing-only".into(),
            ..Default::default()
        };
        assert!(
            orchestrator
                .execute(&plm.collaborators(), "part-1", &options)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_limit_and_unknown_item() {
        let plm = chain();
        let options = ExecuteOptions {
            routing_limit: 500,
            ..Default::default()
        };
        assert!(matches!(
            run(&plm, &options).unwrap_err(),
            Error::InvalidLimit { .. }
        ));

        let err = ReleaseOrchestrator::default()
            .execute(&plm.collaborators(), "ghost", &ExecuteOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::ItemNotFound(_)));
        assert!(plm.events().is_empty());
    }

    #[derive(Default)]
    struct Recorder {
        plans: usize,
        started: Vec<String>,
        completed: Vec<String>,
        rollbacks: Vec<usize>,
    }

    impl ProgressCallback for Recorder {
        fn on_plan_ready(&mut self, _plan: &Plan) {
            self.plans += 1;
        }
        fn on_step_start(&mut self, step: &PlanStep) {
            self.started.push(step.resource_id.clone());
        }
        fn on_step_complete(&mut self, result: &ExecutionResult) {
            self.completed.push(result.label());
        }
        fn on_rollback_start(&mut self, count: usize) {
            self.rollbacks.push(count);
        }
    }

    #[test]
    fn test_progress_sees_every_result() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let mut recorder = Recorder::default();
        let options = ExecuteOptions {
            rollback_on_failure: true,
            ..with_baselines()
        };
        let report = ReleaseOrchestrator::default()
            .execute_with_progress(&plm.collaborators(), "part-1", &options, &mut recorder)
            .unwrap();
        assert_eq!(recorder.plans, 1);
        assert_eq!(recorder.started, vec!["rt-1", "mbom-1", "bl-1"]);
        assert_eq!(recorder.completed, report.labels());
        assert_eq!(recorder.rollbacks, vec![2]);
    }

    #[test]
    fn test_plan_marks_gated_baseline() {
        let plm = chain();
        plm.add_manifest("part-1", 1, &["approved"]);
        let plan = ReleaseOrchestrator::default()
            .plan(&plm.collaborators(), "part-1")
            .unwrap();
        assert_eq!(plan.steps[2].action, StepAction::RequiresEsign);
        let manifest = plan.readiness.esign_manifest.unwrap();
        assert_eq!(manifest.missing_required_meanings(), vec!["approved"]);
    }
}
