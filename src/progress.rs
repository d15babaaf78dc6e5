//! Progress bar over execute steps

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use orchestration::{ExecutionResult, Plan, PlanStep, ProgressCallback};

use crate::ui;

/// Draws one tick per forward step and a line per result
pub struct StepProgress {
    enabled: bool,
    bar: ProgressBar,
}

impl StepProgress {
    /// A hidden bar when `enabled` is false (JSON or quiet output)
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn result_line(result: &ExecutionResult) -> String {
    let mut line = format!(
        "  {} {} {}",
        ui::status(result.status),
        result.kind.as_str().dimmed(),
        result.resource_id
    );
    if let Some(message) = &result.message {
        line.push_str(&format!(" {}", format!("({message})").dimmed()));
    }
    line
}

impl ProgressCallback for StepProgress {
    fn on_plan_ready(&mut self, plan: &Plan) {
        if !self.enabled {
            return;
        }
        self.bar = ProgressBar::new(plan.steps.len() as u64);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-")),
        );
    }

    fn on_step_start(&mut self, step: &PlanStep) {
        self.bar
            .set_message(format!("{} {}", step.kind, step.resource_id));
    }

    fn on_step_complete(&mut self, result: &ExecutionResult) {
        if self.enabled {
            self.bar.println(result_line(result));
        }
        if !result.kind.is_reopen() {
            self.bar.inc(1);
        }
    }

    fn on_rollback_start(&mut self, count: usize) {
        if self.enabled {
            self.bar.println(format!(
                "  {} rolling back {count} released step(s)",
                "↺".magenta()
            ));
        }
        self.bar.set_message("rolling back");
    }
}
