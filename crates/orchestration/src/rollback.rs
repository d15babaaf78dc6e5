//! Rollback stack
//!
//! Every successful forward release pushes an entry. On abort the stack
//! is drained last-in first-out; on a clean finish it is committed
//! (cleared) and nothing is compensated.

use crate::types::ReleaseKind;
use serde::{Deserialize, Serialize};

/// A forward transition that can be compensated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub kind: ReleaseKind,
    pub resource_id: String,
    /// Lifecycle value before the release
    pub state_before: String,
    /// Lifecycle value the release produced
    pub state_released: String,
}

/// LIFO record of applied transitions for one run
#[derive(Debug, Default)]
pub struct RollbackStack {
    entries: Vec<RollbackEntry>,
}

impl RollbackStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RollbackEntry) {
        log::debug!("Rollback stack push: {}:{}", entry.kind, entry.resource_id);
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry, most recent first
    pub fn drain_lifo(&mut self) -> Vec<RollbackEntry> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        entries
    }

    /// Discard the stack after a run that finished without abort
    pub fn commit(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("Committing {} released transitions", self.entries.len());
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: ReleaseKind, id: &str) -> RollbackEntry {
        RollbackEntry {
            kind,
            resource_id: id.into(),
            state_before: "draft".into(),
            state_released: "released".into(),
        }
    }

    #[test]
    fn test_drain_is_lifo_and_empties() {
        let mut stack = RollbackStack::new();
        stack.push(entry(ReleaseKind::RoutingRelease, "rt-1"));
        stack.push(entry(ReleaseKind::RoutingRelease, "rt-2"));
        stack.push(entry(ReleaseKind::MbomRelease, "mbom-1"));
        assert_eq!(stack.len(), 3);

        let drained: Vec<String> = stack
            .drain_lifo()
            .into_iter()
            .map(|e| e.resource_id)
            .collect();
        assert_eq!(drained, vec!["mbom-1", "rt-2", "rt-1"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_commit_clears() {
        let mut stack = RollbackStack::new();
        stack.push(entry(ReleaseKind::BaselineRelease, "bl-1"));
        stack.commit();
        assert!(stack.is_empty());
        assert!(stack.drain_lifo().is_empty());
    }
}
