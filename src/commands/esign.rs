use anyhow::{Result, bail};
use colored::Colorize;
use orchestration::SignatureRequirement;

use crate::Context;
use crate::cli::EsignCommand;
use crate::commands::open_store;
use crate::config::Config;
use crate::{render, ui};

/// Parse `MEANING` or `MEANING:ROLE`
pub fn parse_requirement(raw: &str, required: bool) -> Result<SignatureRequirement> {
    let (meaning, role) = match raw.split_once(':') {
        Some((meaning, role)) => (meaning.trim(), Some(role.trim())),
        None => (raw.trim(), None),
    };
    if meaning.is_empty() {
        bail!("Signature requirement '{raw}' has no meaning");
    }
    Ok(SignatureRequirement {
        meaning: meaning.to_string(),
        role: role.filter(|r| !r.is_empty()).map(str::to_string),
        required,
    })
}

pub fn run(ctx: &Context, cmd: EsignCommand) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(ctx, &config)?;

    match cmd {
        EsignCommand::Status {
            item,
            generation,
            json,
        } => {
            let status = store.manifest_status(&item, generation)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            match status {
                Some(status) => {
                    ui::header(&format!("E-sign status for {item}"));
                    render::manifest(&status);
                    let signatures = store.signature_records(&item, status.generation)?;
                    if !signatures.is_empty() {
                        ui::section("Signatures");
                    }
                    for sig in signatures {
                        let revoked = if sig.is_revoked() {
                            " revoked".red().to_string()
                        } else {
                            String::new()
                        };
                        println!(
                            "  #{} {} by {} at {}{}",
                            sig.id,
                            sig.meaning,
                            sig.signer,
                            render::local_time(&sig.signed_at),
                            revoked
                        );
                    }
                }
                None => ui::info(&format!("No e-sign manifest for {item}; the gate is open")),
            }
        }
        EsignCommand::Manifest {
            item,
            generation,
            required,
            optional,
        } => {
            let requirements = required
                .iter()
                .map(|raw| parse_requirement(raw, true))
                .chain(optional.iter().map(|raw| parse_requirement(raw, false)))
                .collect::<Result<Vec<_>>>()?;
            let manifest = store.create_manifest(&item, generation, &requirements)?;
            ui::success(&format!(
                "Manifest {} created for {}@{} ({} requirements)",
                manifest.id,
                manifest.item_id,
                manifest.generation,
                manifest.requirements.len()
            ));
        }
        EsignCommand::Sign {
            item,
            meaning,
            signer,
            reason,
            generation,
        } => {
            let sig = store.sign(&item, generation, &meaning, &signer, reason.as_deref())?;
            ui::success(&format!(
                "Signature #{} recorded: {} signed {}@{} as '{}'",
                sig.id, sig.signer, sig.item_id, sig.generation, sig.meaning
            ));
            ui::kv("hash", ui::short_hash(&sig.signature_hash));
        }
        EsignCommand::Revoke { signature } => {
            let sig = store.revoke(signature)?;
            ui::success(&format!(
                "Signature #{} revoked ({} on {}@{})",
                sig.id, sig.meaning, sig.item_id, sig.generation
            ));
        }
        EsignCommand::Verify { signature } => {
            let verification = store.verify(signature)?;
            if verification.is_valid {
                ui::success(&format!("Signature #{signature} is valid"));
            } else {
                ui::warn(&format!("Signature #{signature} is not valid"));
                for issue in &verification.issues {
                    ui::dim(issue);
                }
            }
        }
    }
    Ok(())
}
