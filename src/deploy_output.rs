use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::ErrorKind;
use crate::types::{ArtifactSource, BuildArtifact, DeployParse, DeploymentResult};

/// Target triples probed under `<contract>/target/<triple>/release`, in order.
pub const WASM_TARGET_TRIPLES: [&str; 2] = ["wasm32v1-none", "wasm32-unknown-unknown"];

pub const NO_CONTRACT_ID: &str = "Could not extract Contract ID from deployment output";

fn wasm_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"target/wasm32[^/]*/release/\S+\.wasm").expect("wasm path regex"))
}

fn labeled_contract_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i:contract\s+id)[:\s]+(C[A-Z0-9]{55})\b").expect("contract id regex")
    })
}

fn bare_contract_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bC[A-Z0-9]{55}\b").expect("bare contract id regex"))
}

fn transaction_hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)transaction\s+hash(?:\s+is)?[:\s]+([a-f0-9]{64})\b")
            .expect("transaction hash regex")
    })
}

/// The `target/wasm32*/release/*.wasm` path the build printed, if any.
pub fn find_reported_wasm(text: &str) -> Option<&str> {
    wasm_path_re().find(text).map(|m| m.as_str())
}

/// First `.wasm` file under the first existing known target directory.
///
/// Entries are taken in `read_dir` order, so with several artifacts in one
/// directory the pick depends on the filesystem.
pub fn probe_wasm_artifact(contract_path: &Path) -> Option<PathBuf> {
    for triple in WASM_TARGET_TRIPLES {
        let dir = contract_path.join("target").join(triple).join("release");
        if !dir.is_dir() {
            continue;
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let found = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "wasm"));
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn parse_build_output(text: &str, contract_path: &Path) -> BuildArtifact {
    if let Some(rel) = find_reported_wasm(text) {
        return BuildArtifact {
            wasm_path: Some(contract_path.join(rel)),
            source: Some(ArtifactSource::Reported),
        };
    }
    match probe_wasm_artifact(contract_path) {
        Some(path) => BuildArtifact {
            wasm_path: Some(path),
            source: Some(ArtifactSource::Probed),
        },
        None => BuildArtifact::default(),
    }
}

pub fn parse_deploy_output(text: &str) -> DeployParse {
    let contract_id = labeled_contract_id_re()
        .captures(text)
        .map(|c| c[1].to_string())
        .or_else(|| bare_contract_id_re().find(text).map(|m| m.as_str().to_string()));
    let transaction_hash = transaction_hash_re()
        .captures(text)
        .map(|c| c[1].to_string());
    DeployParse {
        contract_id,
        transaction_hash,
    }
}

/// Interprets deploy output; a missing contract id keeps the raw text for diagnosis.
pub fn to_deployment_result(text: &str) -> DeploymentResult {
    let parsed = parse_deploy_output(text);
    match parsed.contract_id {
        Some(contract_id) => DeploymentResult {
            success: true,
            contract_id: Some(contract_id),
            transaction_hash: parsed.transaction_hash,
            deploy_output: Some(text.to_string()),
            ..Default::default()
        },
        None => DeploymentResult {
            deploy_output: Some(text.to_string()),
            ..DeploymentResult::failure(ErrorKind::ParseAmbiguity, NO_CONTRACT_ID)
        },
    }
}
