use colored::{ColoredString, Colorize};
use orchestration::{StepAction, StepStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colored label for a step status
pub fn status(status: StepStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        StepStatus::Executed => label.green(),
        StepStatus::Planned => label.blue(),
        StepStatus::SkippedAlreadyReleased | StepStatus::SkippedDependency => label.dimmed(),
        StepStatus::BlockedEsignIncomplete | StepStatus::BlockedDiagnostics => label.yellow(),
        StepStatus::Failed => label.red(),
        StepStatus::RolledBack => label.magenta(),
    }
}

/// Colored label for a plan action
pub fn action(action: StepAction) -> ColoredString {
    let label = action.as_str();
    match action {
        StepAction::Execute => label.green(),
        StepAction::RequiresEsign => label.yellow(),
        StepAction::SkipAlreadyReleased => label.dimmed(),
    }
}

/// Check or cross for a boolean
pub fn mark(ok: bool) -> ColoredString {
    if ok { "✓".green() } else { "✗".red() }
}

/// Shorten a hash for display
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_status_labels() {
        colored::control::set_override(false);
        assert_eq!(status(StepStatus::RolledBack).to_string(), "rolled_back");
        assert_eq!(action(StepAction::RequiresEsign).to_string(), "requires_esign");
        colored::control::unset_override();
    }
}
