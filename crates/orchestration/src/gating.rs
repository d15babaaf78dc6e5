//! E-sign gating
//!
//! A baseline release is gated on the e-sign manifest of the root item's
//! current generation. With no manifest the gate is open. With a manifest,
//! every required meaning needs at least one non-revoked signature.

use crate::collaborators::{CollaboratorError, EsignManifest, ManifestStore, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Most missing meanings listed in a blocked-step message
const MAX_LISTED_MEANINGS: usize = 10;

/// Signing status of one manifest requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub meaning: String,
    pub role: Option<String>,
    pub required: bool,
    pub signed: bool,
}

/// Completeness of a manifest against its active signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStatus {
    pub manifest_id: String,
    pub item_id: String,
    pub generation: u32,
    pub is_complete: bool,
    pub requirements: Vec<RequirementStatus>,
}

impl ManifestStatus {
    /// Evaluate a manifest against the signatures captured for it
    pub fn evaluate(manifest: &EsignManifest, signatures: &[Signature]) -> Self {
        let signed: BTreeSet<&str> = signatures
            .iter()
            .filter(|s| !s.revoked)
            .map(|s| s.meaning.as_str())
            .collect();

        let requirements: Vec<RequirementStatus> = manifest
            .requirements
            .iter()
            .map(|req| RequirementStatus {
                meaning: req.meaning.clone(),
                role: req.role.clone(),
                required: req.required,
                signed: signed.contains(req.meaning.as_str()),
            })
            .collect();

        let is_complete = requirements.iter().all(|r| !r.required || r.signed);

        Self {
            manifest_id: manifest.id.clone(),
            item_id: manifest.item_id.clone(),
            generation: manifest.generation,
            is_complete,
            requirements,
        }
    }

    /// Required meanings without an active signature, in manifest order
    pub fn missing_required_meanings(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.requirements
            .iter()
            .filter(|r| r.required && !r.signed)
            .filter(|r| seen.insert(r.meaning.as_str()))
            .map(|r| r.meaning.clone())
            .collect()
    }

    /// Message recorded on a step blocked by this manifest
    pub fn blocked_message(&self) -> String {
        let missing = self.missing_required_meanings();
        let mut listed = missing
            .iter()
            .take(MAX_LISTED_MEANINGS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if missing.len() > MAX_LISTED_MEANINGS {
            listed.push_str(", ...");
        }
        format!("Electronic signature manifest incomplete; missing required meanings: {listed}")
    }
}

/// Answers gate questions against a manifest store
pub struct GatingEvaluator<'a> {
    manifests: &'a dyn ManifestStore,
}

impl<'a> GatingEvaluator<'a> {
    pub fn new(manifests: &'a dyn ManifestStore) -> Self {
        Self { manifests }
    }

    /// Manifest status, or `None` if the generation has no manifest
    pub fn status(
        &self,
        item_id: &str,
        generation: u32,
    ) -> Result<Option<ManifestStatus>, CollaboratorError> {
        let Some(manifest) = self.manifests.manifest(item_id, generation)? else {
            return Ok(None);
        };
        let signatures = self.manifests.signatures(item_id, generation)?;
        let status = ManifestStatus::evaluate(&manifest, &signatures);
        log::debug!(
            "Manifest {} for {item_id}@{generation}: complete={}",
            status.manifest_id,
            status.is_complete
        );
        Ok(Some(status))
    }

    /// Whether the gate is open for an item generation
    pub fn is_complete(&self, item_id: &str, generation: u32) -> Result<bool, CollaboratorError> {
        Ok(self
            .status(item_id, generation)?
            .is_none_or(|status| status.is_complete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SignatureRequirement;
    use crate::testing::FakePlm;
    use chrono::Utc;

    fn manifest(reqs: &[(&str, bool)]) -> EsignManifest {
        EsignManifest {
            id: "m-1".into(),
            item_id: "part-1".into(),
            generation: 1,
            requirements: reqs
                .iter()
                .map(|(meaning, required)| SignatureRequirement {
                    meaning: (*meaning).into(),
                    role: None,
                    required: *required,
                })
                .collect(),
        }
    }

    fn signature(meaning: &str, revoked: bool) -> Signature {
        Signature {
            id: format!("sig-{meaning}"),
            meaning: meaning.into(),
            signer: "qa".into(),
            signed_at: Utc::now(),
            revoked,
        }
    }

    #[test]
    fn test_complete_when_required_meanings_signed() {
        let m = manifest(&[("approved", true), ("reviewed", false)]);
        let status = ManifestStatus::evaluate(&m, &[signature("approved", false)]);
        assert!(status.is_complete);
        assert!(status.missing_required_meanings().is_empty());
    }

    #[test]
    fn test_revoked_signature_does_not_count() {
        let m = manifest(&[("approved", true)]);
        let status = ManifestStatus::evaluate(&m, &[signature("approved", true)]);
        assert!(!status.is_complete);
        assert_eq!(status.missing_required_meanings(), vec!["approved"]);
    }

    #[test]
    fn test_blocked_message_lists_missing_meanings() {
        let m = manifest(&[("approved", true), ("released", true)]);
        let status = ManifestStatus::evaluate(&m, &[]);
        assert_eq!(
            status.blocked_message(),
            "Electronic signature manifest incomplete; missing required meanings: approved, released"
        );
    }

    #[test]
    fn test_blocked_message_truncates_after_ten() {
        let names: Vec<String> = (0..12).map(|i| format!("m{i:02}")).collect();
        let reqs: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), true)).collect();
        let status = ManifestStatus::evaluate(&manifest(&reqs), &[]);
        let msg = status.blocked_message();
        assert!(msg.contains("m09"));
        assert!(!msg.contains("m10"));
        assert!(msg.ends_with(", ..."));
    }

    #[test]
    fn test_duplicate_requirements_reported_once() {
        let m = manifest(&[("approved", true), ("approved", true)]);
        let status = ManifestStatus::evaluate(&m, &[]);
        assert_eq!(status.missing_required_meanings(), vec!["approved"]);
    }

    #[test]
    fn test_is_complete_follows_signatures() {
        let plm = FakePlm::new();
        plm.add_item("part-1", 1);
        let gate = GatingEvaluator::new(&plm);

        // no manifest for the generation: gate open
        assert!(gate.is_complete("part-1", 1).unwrap());
        assert!(gate.status("part-1", 1).unwrap().is_none());

        plm.add_manifest("part-1", 1, &["approved"]);
        assert!(!gate.is_complete("part-1", 1).unwrap());

        plm.sign("part-1", 1, "approved");
        assert!(gate.is_complete("part-1", 1).unwrap());

        // other generations are unaffected
        plm.add_manifest("part-1", 2, &["approved"]);
        assert!(!gate.is_complete("part-1", 2).unwrap());
    }
}
