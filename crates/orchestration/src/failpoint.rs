//! Injected release failures
//!
//! A failpoint makes the release of one specific step fail as if the
//! artifact had rejected it, so rollback paths can be exercised against
//! a real store. Failpoints are inert unless the set is enabled.

use crate::types::ReleaseKind;
use std::collections::BTreeSet;

/// Environment variable that enables failpoints
pub const FAILPOINTS_ENV: &str = "RELORCH_TEST_FAILPOINTS";

const PREFIX: &str = "release-orchestration";

/// Message recorded on a step failed by a failpoint
pub const INJECTED_MESSAGE: &str = "Injected failure via failpoint";

/// Set of failpoint keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailpointSet {
    enabled: bool,
    keys: BTreeSet<String>,
}

impl FailpointSet {
    /// Disabled, empty set
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled set with the given keys
    pub fn enabled<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            enabled: true,
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Whether the environment asks for failpoints to be honored
    pub fn env_enabled() -> bool {
        std::env::var(FAILPOINTS_ENV)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key that matches this step, if any
    pub fn matching(&self, kind: ReleaseKind, resource_id: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let resource_type = kind.resource_type();
        let candidates = [
            format!("{kind}:{resource_id}"),
            format!("{resource_type}:{resource_id}"),
            format!("{PREFIX}:{kind}:{resource_id}"),
            format!("{PREFIX}:{resource_type}:{resource_id}"),
        ];
        candidates
            .iter()
            .find_map(|c| self.keys.get(c.as_str()).map(String::as_str))
    }
}
