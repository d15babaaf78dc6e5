use anyhow::Result;
use orchestration::{ExecuteOptions, Limits, PlanRequest, ReleaseOrchestrator};

use crate::Context;
use crate::cli::{LimitArgs, PlanArgs};
use crate::commands::open_store;
use crate::config::Config;
use crate::render;

/// Config limits overridden by any flag given
pub fn limits(defaults: Limits, args: &LimitArgs) -> Limits {
    Limits {
        routing: args.routing_limit.unwrap_or(defaults.routing),
        mbom: args.mbom_limit.unwrap_or(defaults.mbom),
        baseline: args.baseline_limit.unwrap_or(defaults.baseline),
    }
}

/// Every class unless skipped by a flag; ruleset and limits from config
pub fn request(defaults: &ExecuteOptions, args: &PlanArgs) -> PlanRequest {
    PlanRequest {
        ruleset_id: args
            .ruleset
            .clone()
            .unwrap_or_else(|| defaults.effective_ruleset().to_string()),
        include_routings: !args.no_routings,
        include_mboms: !args.no_mboms,
        include_baselines: !args.no_baselines,
        limits: limits(defaults.limits(), &args.limits),
    }
}

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let config = Config::load()?;
    let orchestrator = ReleaseOrchestrator::new(config.registry()?);
    let store = open_store(ctx, &config)?;

    let request = request(&config.execute, &args);
    let plan = orchestrator.plan_with(&store.collaborators(), &args.item, &request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        render::plan(&plan);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestration::ReleaseKind;

    #[test]
    fn test_flags_override_config_limits() {
        let args = LimitArgs {
            routing_limit: Some(5),
            mbom_limit: None,
            baseline_limit: Some(0),
        };
        let limits = limits(Limits::default(), &args);
        assert_eq!(limits.routing, 5);
        assert_eq!(limits.mbom, 20);
        assert_eq!(limits.baseline, 0);
    }

    fn args() -> PlanArgs {
        PlanArgs {
            item: "part-1".into(),
            no_routings: false,
            no_mboms: false,
            no_baselines: false,
            ruleset: None,
            limits: LimitArgs {
                routing_limit: None,
                mbom_limit: None,
                baseline_limit: None,
            },
            json: false,
        }
    }

    #[test]
    fn test_request_includes_every_class_by_default() {
        let request = request(&ExecuteOptions::default(), &args());
        assert!(request.include_routings);
        assert!(request.include_mboms);
        assert!(request.include_baselines);
        assert_eq!(request.ruleset_id, "default");
    }

    #[test]
    fn test_request_skips_flagged_classes() {
        let defaults = ExecuteOptions {
            ruleset_id: "routing-only".into(),
            ..Default::default()
        };
        let args = PlanArgs {
            no_mboms: true,
            no_baselines: true,
            ..args()
        };
        let request = request(&defaults, &args);
        assert_eq!(request.kinds(), vec![ReleaseKind::RoutingRelease]);
        assert_eq!(request.ruleset_id, "routing-only");
    }
}
