//! Electronic signatures
//!
//! Manifests list the signature meanings an item generation needs.
//! Signatures are bound to the item state they were captured against
//! through a content hash, and to their own fields through a signature hash.

use crate::error::{Error, Result};
use crate::PlmStore;
use chrono::{DateTime, SecondsFormat, Utc};
use orchestration::{
    CollaboratorError, EsignManifest, ManifestStatus, ManifestStore, Signature,
    SignatureRequirement,
};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// A stored signature with its audit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: i64,
    pub item_id: String,
    pub generation: u32,
    pub meaning: String,
    pub signer: String,
    pub reason: Option<String>,
    pub content_hash: String,
    pub signature_hash: String,
    pub signed_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SignatureRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Outcome of re-checking a signature against the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub signature_id: i64,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

struct RawSignature {
    id: i64,
    item_id: String,
    generation: u32,
    meaning: String,
    signer: String,
    reason: Option<String>,
    content_hash: String,
    signature_hash: String,
    signed_at: String,
    revoked_at: Option<String>,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Invalid(format!("bad timestamp '{value}': {e}")))
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<SignatureRecord> for Signature {
    fn from(record: SignatureRecord) -> Self {
        Self {
            id: record.id.to_string(),
            revoked: record.is_revoked(),
            meaning: record.meaning,
            signer: record.signer,
            signed_at: record.signed_at,
        }
    }
}

impl TryFrom<RawSignature> for SignatureRecord {
    type Error = Error;

    fn try_from(raw: RawSignature) -> Result<Self> {
        Ok(Self {
            id: raw.id,
            item_id: raw.item_id,
            generation: raw.generation,
            meaning: raw.meaning,
            signer: raw.signer,
            reason: raw.reason,
            content_hash: raw.content_hash,
            signature_hash: raw.signature_hash,
            signed_at: parse_time(&raw.signed_at)?,
            revoked_at: raw.revoked_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

const SIGNATURE_COLUMNS: &str = "id, item_id, generation, meaning, signer, reason, \
     content_hash, signature_hash, signed_at, revoked_at";

fn raw_signature(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSignature> {
    Ok(RawSignature {
        id: row.get(0)?,
        item_id: row.get(1)?,
        generation: row.get(2)?,
        meaning: row.get(3)?,
        signer: row.get(4)?,
        reason: row.get(5)?,
        content_hash: row.get(6)?,
        signature_hash: row.get(7)?,
        signed_at: row.get(8)?,
        revoked_at: row.get(9)?,
    })
}

fn signature_hash(
    item_id: &str,
    generation: u32,
    signer: &str,
    meaning: &str,
    content_hash: &str,
    signed_at: &str,
) -> String {
    let payload = format!("{item_id}:{generation}:{signer}:{meaning}:{content_hash}:{signed_at}");
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

impl PlmStore {
    fn content_hash(&self, item_id: &str, generation: u32) -> Result<String> {
        let item = self
            .item(item_id)?
            .ok_or_else(|| Error::not_found("item", item_id))?;
        let payload = format!("{}:{generation}:{}", item.id, item.state);
        Ok(blake3::hash(payload.as_bytes()).to_hex().to_string())
    }

    fn generation_or_current(&self, item_id: &str, generation: Option<u32>) -> Result<u32> {
        match generation {
            Some(generation) => {
                self.require_generation(item_id)?;
                Ok(generation)
            }
            None => self.require_generation(item_id),
        }
    }

    /// Create the manifest for an item generation (current if `None`)
    pub fn create_manifest(
        &self,
        item_id: &str,
        generation: Option<u32>,
        requirements: &[SignatureRequirement],
    ) -> Result<EsignManifest> {
        if requirements.is_empty() {
            return Err(Error::Invalid(
                "a manifest needs at least one signature requirement".to_string(),
            ));
        }
        if let Some(req) = requirements.iter().find(|r| r.meaning.trim().is_empty()) {
            return Err(Error::Invalid(format!(
                "signature meaning must not be empty (role: {})",
                req.role.as_deref().unwrap_or("-")
            )));
        }

        let generation = self.generation_or_current(item_id, generation)?;
        let json = serde_json::to_string(requirements)?;
        let inserted = self.conn().execute(
            "INSERT INTO esign_manifests (item_id, generation, required_signatures)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(item_id, generation) DO NOTHING",
            params![item_id, generation, json],
        )?;
        if inserted == 0 {
            return Err(Error::Conflict(format!(
                "Manifest already exists for {item_id} generation {generation}"
            )));
        }

        log::info!(
            "Created e-sign manifest for {item_id}@{generation} ({} requirements)",
            requirements.len()
        );
        Ok(EsignManifest {
            id: self.conn().last_insert_rowid().to_string(),
            item_id: item_id.to_string(),
            generation,
            requirements: requirements.to_vec(),
        })
    }

    fn load_manifest(&self, item_id: &str, generation: u32) -> Result<Option<EsignManifest>> {
        let row: Option<(i64, String)> = self
            .conn()
            .query_row(
                "SELECT id, required_signatures FROM esign_manifests
                 WHERE item_id = ?1 AND generation = ?2",
                params![item_id, generation],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(id, json)| -> Result<EsignManifest> {
            Ok(EsignManifest {
                id: id.to_string(),
                item_id: item_id.to_string(),
                generation,
                requirements: serde_json::from_str(&json)?,
            })
        })
        .transpose()
    }

    /// Capture a signature against an item generation (current if `None`)
    pub fn sign(
        &self,
        item_id: &str,
        generation: Option<u32>,
        meaning: &str,
        signer: &str,
        reason: Option<&str>,
    ) -> Result<SignatureRecord> {
        if meaning.trim().is_empty() {
            return Err(Error::Invalid("signature meaning must not be empty".to_string()));
        }
        if signer.trim().is_empty() {
            return Err(Error::Invalid("signer must not be empty".to_string()));
        }

        let generation = self.generation_or_current(item_id, generation)?;
        let content_hash = self.content_hash(item_id, generation)?;
        let signed_at = Utc::now();
        let stamp = format_time(signed_at);
        let signature_hash =
            signature_hash(item_id, generation, signer, meaning, &content_hash, &stamp);

        self.conn().execute(
            "INSERT INTO signatures
                (item_id, generation, meaning, signer, reason, content_hash, signature_hash, signed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item_id,
                generation,
                meaning,
                signer,
                reason,
                content_hash,
                signature_hash,
                stamp
            ],
        )?;
        let id = self.conn().last_insert_rowid();
        log::info!("{signer} signed {item_id}@{generation} as '{meaning}' (signature {id})");

        self.signature(id)
    }

    /// Look up a signature by id
    pub fn signature(&self, id: i64) -> Result<SignatureRecord> {
        let sql = format!("SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE id = ?1");
        self.conn()
            .query_row(&sql, [id], raw_signature)
            .optional()?
            .ok_or_else(|| Error::not_found("signature", id.to_string()))?
            .try_into()
    }

    /// Signatures of an item generation, oldest first
    pub fn signature_records(&self, item_id: &str, generation: u32) -> Result<Vec<SignatureRecord>> {
        let sql = format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures
             WHERE item_id = ?1 AND generation = ?2
             ORDER BY id"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![item_id, generation], raw_signature)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(SignatureRecord::try_from(row?)?);
        }
        Ok(records)
    }

    /// Revoke a signature; revoked signatures no longer satisfy a manifest
    pub fn revoke(&self, id: i64) -> Result<SignatureRecord> {
        let record = self.signature(id)?;
        if record.is_revoked() {
            return Err(Error::Conflict("Signature is already revoked".to_string()));
        }
        self.conn().execute(
            "UPDATE signatures SET revoked_at = ?2 WHERE id = ?1 AND revoked_at IS NULL",
            params![id, format_time(Utc::now())],
        )?;
        log::info!("Revoked signature {id} on {}@{}", record.item_id, record.generation);
        self.signature(id)
    }

    /// Recompute the hashes of a signature
    pub fn verify(&self, id: i64) -> Result<Verification> {
        let record = self.signature(id)?;
        let mut issues = Vec::new();

        if record.is_revoked() {
            issues.push("Signature status is revoked".to_string());
        }
        if let Some(item) = self.item(&record.item_id)?
            && item.generation == record.generation
            && self.content_hash(&record.item_id, record.generation)? != record.content_hash
        {
            issues.push("Content has been modified since signing".to_string());
        }
        let expected = signature_hash(
            &record.item_id,
            record.generation,
            &record.signer,
            &record.meaning,
            &record.content_hash,
            &format_time(record.signed_at),
        );
        if expected != record.signature_hash {
            issues.push("Signature hash mismatch".to_string());
        }

        Ok(Verification {
            signature_id: id,
            is_valid: issues.is_empty(),
            issues,
        })
    }

    /// Manifest completeness for an item generation (current if `None`)
    pub fn manifest_status(
        &self,
        item_id: &str,
        generation: Option<u32>,
    ) -> Result<Option<ManifestStatus>> {
        let generation = self.generation_or_current(item_id, generation)?;
        let Some(manifest) = self.load_manifest(item_id, generation)? else {
            return Ok(None);
        };
        let signatures: Vec<Signature> = self
            .signature_records(item_id, generation)?
            .into_iter()
            .map(Signature::from)
            .collect();
        Ok(Some(ManifestStatus::evaluate(&manifest, &signatures)))
    }
}

impl ManifestStore for PlmStore {
    fn manifest(
        &self,
        item_id: &str,
        generation: u32,
    ) -> std::result::Result<Option<EsignManifest>, CollaboratorError> {
        Ok(self.load_manifest(item_id, generation)?)
    }

    fn signatures(
        &self,
        item_id: &str,
        generation: u32,
    ) -> std::result::Result<Vec<Signature>, CollaboratorError> {
        Ok(self
            .signature_records(item_id, generation)?
            .into_iter()
            .map(Signature::from)
            .collect())
    }
}
