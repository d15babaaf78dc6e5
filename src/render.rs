//! Human-readable output for plans, reports and e-sign status

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use orchestration::{
    Diagnostics, ExecutionReport, KindListing, ManifestStatus, Plan, Readiness,
};

use crate::ui;

/// Timestamp in the local timezone
pub fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn issues(diagnostics: &Diagnostics) {
    for error in &diagnostics.errors {
        println!("      {} {} {}", "error".red(), error.code, error.message.dimmed());
    }
    for warning in &diagnostics.warnings {
        println!(
            "      {} {} {}",
            "warn".yellow(),
            warning.code,
            warning.message.dimmed()
        );
    }
}

pub fn manifest(status: &ManifestStatus) {
    let state = if status.is_complete {
        "complete".green()
    } else {
        "incomplete".yellow()
    };
    println!(
        "  manifest {} for {}@{}: {}",
        status.manifest_id, status.item_id, status.generation, state
    );
    for req in &status.requirements {
        let role = req.role.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
        let required = if req.required { "required" } else { "optional" };
        println!(
            "    {} {}{} {}",
            ui::mark(req.signed || !req.required),
            req.meaning,
            role,
            required.dimmed()
        );
    }
}

pub fn readiness(readiness: &Readiness) {
    let summary = &readiness.summary;
    ui::section("Readiness");
    ui::kv("ruleset", &readiness.ruleset_id);
    ui::kv(
        "resources",
        &format!("{} ({} ok)", summary.resources, summary.ok_resources),
    );
    ui::kv("errors", &summary.error_count.to_string());
    ui::kv("warnings", &summary.warning_count.to_string());
    for (kind, counts) in &summary.by_kind {
        ui::dim(&format!(
            "{kind}: {}/{} ok, {} errors, {} warnings",
            counts.ok_resources, counts.resources, counts.error_count, counts.warning_count
        ));
    }
    match &readiness.esign_manifest {
        Some(status) => manifest(status),
        None => ui::dim("no e-sign manifest for the current generation"),
    }
}

pub fn plan(plan: &Plan) {
    ui::header(&format!("Release plan for {}", plan.item_id));
    ui::kv("fingerprint", ui::short_hash(&plan.fingerprint));

    if plan.steps.is_empty() {
        ui::info("Nothing to release");
    }
    for (i, step) in plan.steps.iter().enumerate() {
        let name = step.name.as_deref().unwrap_or("");
        println!(
            "{} {} {} {} [{}] {}",
            format!("{:>3}.", i + 1).blue().bold(),
            ui::mark(step.diagnostics.is_ok()),
            step.kind.as_str().dimmed(),
            step.resource_id,
            step.state,
            ui::action(step.action)
        );
        if !name.is_empty() {
            ui::dim(&format!("     {name}"));
        }
        if !step.depends_on.is_empty() {
            let deps: Vec<String> = step.depends_on.iter().map(ToString::to_string).collect();
            ui::dim(&format!("     after {}", deps.join(", ")));
        }
        issues(&step.diagnostics);
    }

    readiness(&plan.readiness);
}

pub fn report(report: &ExecutionReport) {
    let summary = report.summary();
    ui::header(&format!(
        "{} for {} ({})",
        if report.dry_run { "Dry run" } else { "Release" },
        report.item_id,
        local_time(&report.generated_at)
    ));

    for result in &report.results {
        let change = match (&result.state_before, &result.state_after) {
            (Some(before), Some(after)) if before != after => format!(" {before} → {after}"),
            _ => String::new(),
        };
        println!(
            "  {:<26} {} {}{}",
            result.kind.as_str().dimmed(),
            result.resource_id,
            ui::status(result.status),
            change
        );
        if let Some(message) = &result.message {
            ui::dim(&format!("  {message}"));
        }
    }

    println!();
    let counts = format!(
        "{} executed, {} planned, {} skipped, {} blocked, {} failed, {} rolled back",
        summary.executed,
        summary.planned,
        summary.skipped,
        summary.blocked,
        summary.failed,
        summary.rolled_back
    );
    if summary.is_success() {
        ui::success(&counts);
    } else {
        ui::warn(&counts);
    }

    if let Some(post) = &report.post_readiness {
        readiness(post);
    }
}

pub fn rulesets(listings: &[KindListing]) {
    for listing in listings {
        ui::section(listing.kind.as_str());
        ui::kv("existence rule", &listing.existence_rule_id);
        for ruleset in &listing.rulesets {
            println!(
                "  {} {}",
                ruleset.ruleset_id.bold(),
                format!("({})", ruleset.source.as_str()).dimmed()
            );
            for rule in &ruleset.rule_ids {
                ui::dim(&format!("  {rule}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_time_matches_local_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 5, 0).unwrap();
        let local = at.with_timezone(&Local);
        let shown = local_time(&at);
        assert_eq!(shown.len(), "2024-03-09 17:05:00".len());
        assert_eq!(shown, local.format("%Y-%m-%d %H:%M:%S").to_string());
        assert!(!shown.contains("UTC"));
    }
}
