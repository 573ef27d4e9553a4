//! Offline signing commands
//!
//! Each command works on files and configuration only; nothing here talks
//! to the network.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use blocksign_client::{sign_sweep, sign_withdrawal, ApiResponse, Operation};
use blocksign_core::{pin_to_aes_key, Key, SigningRequest};
use serde::Serialize;
use serde_json::Value;

/// Where `pubkey` takes its key from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Wif(String),
    Passphrase(String),
}

/// Result of signing a request file
#[derive(Debug, Serialize)]
pub struct SignOutcome {
    /// Signatures added by this run
    pub signed: usize,
    /// Slots still waiting for co-signers
    pub pending: usize,
    /// Form value for the finalize call
    pub signature_data: String,
}

/// Print the base64 AES key derived from the configured PIN.
pub fn pin_key(config: &CliConfig) -> Result<String> {
    let key = pin_to_aes_key(config.pin()?, config.security.pbkdf2_iterations)
        .context("Failed to derive PIN key")?;
    Ok(key.as_base64().to_string())
}

/// Sign a withdrawal request with the key behind the configured PIN.
pub fn sign(config: &CliConfig, request_json: &str) -> Result<SignOutcome> {
    let aes_key = pin_to_aes_key(config.pin()?, config.security.pbkdf2_iterations)
        .context("Failed to derive PIN key")?;
    let mut request = parse_request(Operation::Withdraw, request_json)?;
    let signed = sign_withdrawal(&mut request, &aes_key).context("Failed to sign withdrawal")?;
    outcome(&request, signed)
}

/// Sign a sweep request with a WIF key.
pub fn sweep_sign(wif: &str, request_json: &str) -> Result<SignOutcome> {
    let key = Key::from_wif_checked(wif).context("Invalid WIF private key")?;
    let mut request = parse_request(Operation::SweepFromAddress, request_json)?;
    let signed = sign_sweep(&mut request, &key).context("Failed to sign sweep")?;
    outcome(&request, signed)
}

pub fn pubkey(source: &KeySource) -> Result<String> {
    let key = match source {
        KeySource::Wif(wif) => Key::from_wif_checked(wif).context("Invalid WIF private key")?,
        KeySource::Passphrase(hex) => Key::from_passphrase(hex).context("Invalid passphrase")?,
    };
    Ok(key.public_key())
}

/// Accept either a whole `{status, data}` response or just its `data`.
fn parse_request(operation: Operation, json: &str) -> Result<SigningRequest> {
    let value: Value = serde_json::from_str(json).context("Request file is not valid JSON")?;
    let request = if value.get("status").is_some() && value.get("data").is_some() {
        ApiResponse::parse(operation, json)
            .and_then(|response| response.signing_request())
            .context("Failed to read signing request")?
    } else {
        SigningRequest::from_value(value).context("Failed to read signing request")?
    };
    anyhow::ensure!(
        request.reference_id.is_some(),
        "Request has no reference_id; nothing to sign"
    );
    Ok(request)
}

fn outcome(request: &SigningRequest, signed: usize) -> Result<SignOutcome> {
    Ok(SignOutcome {
        signed,
        pending: request.pending_signers(),
        signature_data: request
            .to_signature_data()
            .context("Failed to serialize signed request")?,
    })
}
