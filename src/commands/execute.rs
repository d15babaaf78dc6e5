use anyhow::Result;
use dialoguer::Confirm;
use orchestration::{ExecuteOptions, ExecuteSummary, ReleaseOrchestrator};
use thiserror::Error;

use crate::Context;
use crate::cli::ExecuteArgs;
use crate::commands::{open_store, plan::limits};
use crate::config::Config;
use crate::progress::StepProgress;
use crate::{render, ui};

/// The run finished but left steps blocked, failed or rolled back
#[derive(Debug, Error)]
#[error(
    "release of {item_id} incomplete: {} blocked, {} failed, {} rolled back",
    .summary.blocked,
    .summary.failed,
    .summary.rolled_back
)]
pub struct ReleaseIncomplete {
    pub item_id: String,
    pub summary: ExecuteSummary,
}

/// Config defaults with command-line flags applied on top
pub fn options(defaults: &ExecuteOptions, args: &ExecuteArgs) -> ExecuteOptions {
    let limits = limits(defaults.limits(), &args.limits);
    ExecuteOptions {
        include_routings: defaults.include_routings && !args.no_routings,
        include_mboms: defaults.include_mboms && !args.no_mboms,
        include_baselines: defaults.include_baselines || args.baselines,
        ruleset_id: args
            .ruleset
            .clone()
            .unwrap_or_else(|| defaults.ruleset_id.clone()),
        dry_run: defaults.dry_run || args.dry_run,
        rollback_on_failure: defaults.rollback_on_failure || args.rollback_on_failure,
        continue_on_error: defaults.continue_on_error || args.continue_on_error,
        baseline_force: defaults.baseline_force || args.baseline_force,
        routing_limit: limits.routing,
        mbom_limit: limits.mbom,
        baseline_limit: limits.baseline,
    }
}

fn confirm_release(item_id: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!("Release {item_id}?"))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

pub fn run(ctx: &Context, args: ExecuteArgs) -> Result<()> {
    let config = Config::load()?;
    let options = options(&config.execute, &args);
    let orchestrator = ReleaseOrchestrator::new(config.registry()?)
        .with_failpoints(config.failpoints(&args.failpoints));

    // Reject bad options before opening the store or prompting
    orchestrator.validate(&options)?;
    let store = open_store(ctx, &config)?;
    let collab = store.collaborators();

    if !options.dry_run && !args.yes && !args.json {
        let plan = orchestrator.plan_with(&collab, &args.item, &options.plan_request())?;
        render::plan(&plan);
        println!();
        if !confirm_release(&args.item)? {
            ui::info("Aborted, nothing released");
            return Ok(());
        }
    }

    let mut progress = StepProgress::new(!args.json && !ctx.quiet);
    let outcome = orchestrator.execute_with_progress(&collab, &args.item, &options, &mut progress);
    progress.finish();

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            if let orchestration::Error::RollbackFailed { results, .. } = &err {
                ui::error("Rollback stopped; results recorded before the failure:");
                for result in results {
                    ui::dim(&result.label());
                }
            }
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::report(&report);
    }

    let summary = report.summary();
    if !summary.is_success() {
        return Err(ReleaseIncomplete {
            item_id: report.item_id,
            summary,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::LimitArgs;

    fn args() -> ExecuteArgs {
        ExecuteArgs {
            item: "part-1".into(),
            no_routings: false,
            no_mboms: false,
            baselines: false,
            ruleset: None,
            dry_run: false,
            rollback_on_failure: false,
            continue_on_error: false,
            baseline_force: false,
            failpoints: Vec::new(),
            limits: LimitArgs {
                routing_limit: None,
                mbom_limit: None,
                baseline_limit: None,
            },
            yes: true,
            json: false,
        }
    }

    #[test]
    fn test_defaults_pass_through() {
        let options = options(&ExecuteOptions::default(), &args());
        assert_eq!(options, ExecuteOptions::default());
    }

    #[test]
    fn test_flags_override_config() {
        let defaults = ExecuteOptions {
            ruleset_id: "strict".into(),
            routing_limit: 50,
            ..Default::default()
        };
        let args = ExecuteArgs {
            no_mboms: true,
            baselines: true,
            ruleset: Some("readiness".into()),
            rollback_on_failure: true,
            limits: LimitArgs {
                routing_limit: None,
                mbom_limit: Some(3),
                baseline_limit: None,
            },
            ..args()
        };
        let options = options(&defaults, &args);

        assert!(options.include_routings);
        assert!(!options.include_mboms);
        assert!(options.include_baselines);
        assert_eq!(options.ruleset_id, "readiness");
        assert!(options.rollback_on_failure);
        assert_eq!(options.routing_limit, 50);
        assert_eq!(options.mbom_limit, 3);
    }

    #[test]
    fn test_incomplete_message() {
        let err = ReleaseIncomplete {
            item_id: "part-1".into(),
            summary: ExecuteSummary {
                blocked: 1,
                rolled_back: 2,
                ..Default::default()
            },
        };
        assert_eq!(
            err.to_string(),
            "release of part-1 incomplete: 1 blocked, 0 failed, 2 rolled back"
        );
    }
}
