//! Ruleset registry
//!
//! Maps `(kind, ruleset_id)` to the ordered list of rule ids evaluated
//! for a release. Built-in `default` and `readiness` rulesets exist for
//! every kind; configured rulesets may add new ids or override built-ins.
//! The existence rule of a kind always leads every resolved list.

use crate::error::{Error, Result};
use crate::types::ReleaseKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RULESET_ID_PATTERN: &str = r"^[A-Za-z0-9_.-]{1,100}$";

const ROUTING_DEFAULT: &[&str] = &[
    "routing.exists",
    "routing.not_already_released",
    "routing.has_operations",
    "routing.has_scope",
    "routing.primary_unique_in_scope",
    "routing.operation_workcenters_valid",
];

const MBOM_DEFAULT: &[&str] = &[
    "mbom.exists",
    "mbom.not_already_released",
    "mbom.has_non_empty_structure",
    "mbom.has_released_routing",
];

const BASELINE_DEFAULT: &[&str] = &[
    "baseline.exists",
    "baseline.not_already_released",
    "baseline.members_references_exist",
    "baseline.warnings_for_unreleased_or_changed_members",
];

/// Every rule id a kind understands; the default ruleset uses all of them
pub fn allowed_rules(kind: ReleaseKind) -> &'static [&'static str] {
    match kind {
        ReleaseKind::RoutingRelease => ROUTING_DEFAULT,
        ReleaseKind::MbomRelease => MBOM_DEFAULT,
        ReleaseKind::BaselineRelease => BASELINE_DEFAULT,
    }
}

/// Rule that must run first for a kind
pub fn existence_rule(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::RoutingRelease => "routing.exists",
        ReleaseKind::MbomRelease => "mbom.exists",
        ReleaseKind::BaselineRelease => "baseline.exists",
    }
}

fn not_already_released_rule(kind: ReleaseKind) -> String {
    format!("{}.not_already_released", kind.resource_type())
}

/// Where a ruleset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetSource {
    Builtin,
    Configured,
}

impl RulesetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Configured => "configured",
        }
    }
}

/// A resolved ruleset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    pub kind: ReleaseKind,
    pub id: String,
    /// Rule ids in evaluation order, existence rule first
    pub rules: Vec<String>,
}

impl Ruleset {
    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.iter().any(|r| r == rule_id)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    rules: Vec<String>,
    source: RulesetSource,
}

/// Directory listing of one ruleset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetListing {
    pub ruleset_id: String,
    pub source: RulesetSource,
    pub rule_ids: Vec<String>,
}

/// Directory listing of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindListing {
    pub kind: ReleaseKind,
    pub existence_rule_id: String,
    pub allowed_rule_ids: Vec<String>,
    pub rulesets: Vec<RulesetListing>,
}

/// Configured rulesets keyed by kind name, then ruleset id
pub type RulesetConfig = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Registry of rulesets per kind
#[derive(Debug, Clone)]
pub struct RulesetRegistry {
    kinds: BTreeMap<ReleaseKind, BTreeMap<String, Entry>>,
}

impl Default for RulesetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RulesetRegistry {
    /// Registry holding only the built-in rulesets
    pub fn builtin() -> Self {
        let mut kinds = BTreeMap::new();
        for kind in ReleaseKind::ALL {
            let default: Vec<String> = allowed_rules(kind).iter().map(|r| (*r).to_string()).collect();
            let skip = not_already_released_rule(kind);
            let readiness: Vec<String> = default.iter().filter(|r| **r != skip).cloned().collect();

            let mut rulesets = BTreeMap::new();
            rulesets.insert(
                "default".to_string(),
                Entry {
                    rules: default,
                    source: RulesetSource::Builtin,
                },
            );
            rulesets.insert(
                "readiness".to_string(),
                Entry {
                    rules: readiness,
                    source: RulesetSource::Builtin,
                },
            );
            kinds.insert(kind, rulesets);
        }
        Self { kinds }
    }

    /// Built-in rulesets extended (or overridden) by configured ones
    pub fn with_configured(config: &RulesetConfig) -> Result<Self> {
        let mut registry = Self::builtin();
        for (kind_name, rulesets) in config {
            let kind: ReleaseKind =
                kind_name
                    .parse()
                    .map_err(|message: String| Error::InvalidRulesetConfig {
                        kind: kind_name.clone(),
                        message,
                    })?;
            for (ruleset_id, rule_ids) in rulesets {
                registry.insert_configured(kind, ruleset_id, rule_ids)?;
            }
        }
        Ok(registry)
    }

    fn insert_configured(
        &mut self,
        kind: ReleaseKind,
        ruleset_id: &str,
        rule_ids: &[String],
    ) -> Result<()> {
        let ruleset_id = ruleset_id.trim();
        let pattern = Regex::new(RULESET_ID_PATTERN).map_err(|e| Error::InvalidRulesetConfig {
            kind: kind.to_string(),
            message: format!("ruleset id pattern: {e}"),
        })?;
        if !pattern.is_match(ruleset_id) {
            return Err(Error::InvalidRulesetConfig {
                kind: kind.to_string(),
                message: format!("invalid ruleset id '{ruleset_id}'"),
            });
        }

        let rules: Vec<String> = rule_ids
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        let allowed = allowed_rules(kind);
        let mut unknown: Vec<&str> = rules
            .iter()
            .map(String::as_str)
            .filter(|r| !allowed.contains(r))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            unknown.dedup();
            return Err(Error::InvalidRulesetConfig {
                kind: kind.to_string(),
                message: format!(
                    "{kind}.{ruleset_id} contains unknown rule ids: {}",
                    unknown.join(", ")
                ),
            });
        }

        log::debug!("Configured ruleset {kind}.{ruleset_id}: {rules:?}");
        self.kinds.entry(kind).or_default().insert(
            ruleset_id.to_string(),
            Entry {
                rules,
                source: RulesetSource::Configured,
            },
        );
        Ok(())
    }

    /// Ruleset ids known for a kind, sorted
    pub fn known(&self, kind: ReleaseKind) -> Vec<String> {
        self.kinds
            .get(&kind)
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve a ruleset; the existence rule is moved or added to the front
    pub fn resolve(&self, kind: ReleaseKind, ruleset_id: &str) -> Result<Ruleset> {
        let entry = self
            .kinds
            .get(&kind)
            .and_then(|r| r.get(ruleset_id))
            .ok_or_else(|| Error::UnknownRuleset {
                kind,
                ruleset_id: ruleset_id.to_string(),
                known: self.known(kind),
            })?;

        Ok(Ruleset {
            kind,
            id: ruleset_id.to_string(),
            rules: with_existence_first(kind, &entry.rules),
        })
    }

    /// Resolve one ruleset id for every kind given
    pub fn resolve_all(
        &self,
        kinds: &[ReleaseKind],
        ruleset_id: &str,
    ) -> Result<BTreeMap<ReleaseKind, Ruleset>> {
        kinds
            .iter()
            .map(|kind| Ok((*kind, self.resolve(*kind, ruleset_id)?)))
            .collect()
    }

    /// Introspection listing of every kind and ruleset
    pub fn directory(&self) -> Vec<KindListing> {
        self.kinds
            .iter()
            .map(|(kind, rulesets)| KindListing {
                kind: *kind,
                existence_rule_id: existence_rule(*kind).to_string(),
                allowed_rule_ids: {
                    let mut ids: Vec<String> =
                        allowed_rules(*kind).iter().map(|r| (*r).to_string()).collect();
                    ids.sort();
                    ids
                },
                rulesets: rulesets
                    .iter()
                    .map(|(id, entry)| RulesetListing {
                        ruleset_id: id.clone(),
                        source: entry.source,
                        rule_ids: with_existence_first(*kind, &entry.rules),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn with_existence_first(kind: ReleaseKind, rules: &[String]) -> Vec<String> {
    let existence = existence_rule(kind);
    std::iter::once(existence.to_string())
        .chain(rules.iter().filter(|r| *r != existence).cloned())
        .collect()
}
