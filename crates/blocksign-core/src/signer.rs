//! Transaction input signing
//!
//! The remote service hands back a signing request: a list of inputs, each
//! with the public keys that must sign its `data_to_sign`. We fill in
//! `signed_data` for every signer whose public key belongs to one of our
//! keys and leave the rest for co-signers (dTrust / multisig).
//!
//! The request is re-submitted whole, so any field we do not model is kept
//! in `extra` and written back unchanged.

use crate::keys::{Key, KeyError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("Keys must contain at least one key")]
    NoKeysProvided,
    #[error("Malformed signing request: {0}")]
    MalformedRequest(String),
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Passphrase blob as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedPassphrase {
    /// Base64 AES-256-ECB ciphertext of the hex passphrase
    pub passphrase: String,
    /// Public key the decrypted passphrase must reproduce
    pub signer_public_key: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One required signature slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    pub signer_public_key: String,
    /// Hex DER signature, `null` until someone signs
    #[serde(default)]
    pub signed_data: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub data_to_sign: String,
    #[serde(default)]
    pub signers: Vec<Signer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `data` object of a response that asks for client-side signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_passphrase: Option<EncryptedPassphrase>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SigningRequest {
    /// Parse the `data` object of a signing response.
    pub fn from_value(data: Value) -> Result<Self, SignError> {
        serde_json::from_value(data).map_err(|e| SignError::MalformedRequest(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SignError> {
        serde_json::from_str(json).map_err(|e| SignError::MalformedRequest(e.to_string()))
    }

    /// JSON text submitted back as `signature_data`.
    pub fn to_signature_data(&self) -> Result<String, SignError> {
        serde_json::to_string(self).map_err(|e| SignError::MalformedRequest(e.to_string()))
    }

    /// Sign every input slot one of `keys` owns. See [`sign_data`].
    pub fn sign(&mut self, keys: &[Key]) -> Result<usize, SignError> {
        sign_data(&mut self.inputs, keys)
    }

    /// Signer slots still waiting for a signature.
    pub fn pending_signers(&self) -> usize {
        self.inputs
            .iter()
            .flat_map(|input| &input.signers)
            .filter(|signer| signer.signed_data.is_none())
            .count()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.pending_signers() == 0
    }
}

/// Sign each input for every signer slot whose public key matches a key.
///
/// Slots that already carry a signature are left alone, as are slots no key
/// matches. Every signature is produced before any slot is written, so on
/// error `inputs` is unchanged. Returns the number of signatures added.
pub fn sign_data(inputs: &mut [Input], keys: &[Key]) -> Result<usize, SignError> {
    if keys.is_empty() {
        return Err(SignError::NoKeysProvided);
    }

    let owned: Vec<(String, &Key)> = keys.iter().map(|key| (key.public_key(), key)).collect();

    let mut signatures = Vec::new();
    for (i, input) in inputs.iter().enumerate() {
        for (j, signer) in input.signers.iter().enumerate() {
            if signer.signed_data.is_some() {
                continue;
            }
            if let Some((_, key)) = owned
                .iter()
                .find(|(public_key, _)| *public_key == signer.signer_public_key)
            {
                signatures.push((i, j, key.sign(&input.data_to_sign)?));
            }
        }
    }

    let added = signatures.len();
    for (i, j, signature) in signatures {
        inputs[i].signers[j].signed_data = Some(signature);
    }

    log::debug!("added {} signature(s) across {} input(s)", added, inputs.len());
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DATA: &str = "a3f1c2d4e5b6a7980011223344556677889900aabbccddeeff00112233445566";

    fn signer(public_key: &str) -> Signer {
        Signer {
            signer_public_key: public_key.to_string(),
            signed_data: None,
            extra: Map::new(),
        }
    }

    fn input(data: &str, signers: Vec<Signer>) -> Input {
        Input {
            data_to_sign: data.to_string(),
            signers,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_no_keys_provided() {
        let mut inputs = vec![input(DATA, vec![signer("02aa")])];
        assert_eq!(sign_data(&mut inputs, &[]), Err(SignError::NoKeysProvided));
    }

    #[test]
    fn test_signs_only_matching_signer() {
        let ours = Key::generate(true);
        let theirs = Key::generate(true);
        let mut inputs = vec![input(
            DATA,
            vec![signer(&ours.public_key()), signer(&theirs.public_key())],
        )];

        let added = sign_data(&mut inputs, std::slice::from_ref(&ours)).unwrap();
        assert_eq!(added, 1);

        let a = inputs[0].signers[0].signed_data.as_ref().unwrap();
        assert!(ours.verify(DATA, a).unwrap());
        assert!(inputs[0].signers[1].signed_data.is_none());
    }

    #[test]
    fn test_multiple_keys_multiple_inputs() {
        let k1 = Key::generate(true);
        let k2 = Key::generate(false);
        let other = Key::generate(true);
        let data2 = "00".repeat(32);
        let mut inputs = vec![
            input(DATA, vec![signer(&k1.public_key()), signer(&k2.public_key())]),
            input(
                &data2,
                vec![signer(&other.public_key()), signer(&k2.public_key())],
            ),
        ];

        let keys = vec![k1, k2];
        assert_eq!(sign_data(&mut inputs, &keys).unwrap(), 3);

        let sig = inputs[1].signers[1].signed_data.as_ref().unwrap();
        assert!(keys[1].verify(&data2, sig).unwrap());
        assert!(inputs[1].signers[0].signed_data.is_none());
    }

    #[test]
    fn test_existing_signature_never_overwritten() {
        let key = Key::generate(true);
        let mut slot = signer(&key.public_key());
        slot.signed_data = Some("3006020101020101".to_string());
        let mut inputs = vec![input(DATA, vec![slot])];

        assert_eq!(sign_data(&mut inputs, &[key]).unwrap(), 0);
        assert_eq!(
            inputs[0].signers[0].signed_data.as_deref(),
            Some("3006020101020101")
        );
    }

    #[test]
    fn test_invalid_data_to_sign() {
        let key = Key::generate(true);
        let mut inputs = vec![input("not-hex", vec![signer(&key.public_key())])];
        assert!(matches!(
            sign_data(&mut inputs, &[key]),
            Err(SignError::Key(KeyError::InvalidSignatureInput(_)))
        ));
    }

    #[test]
    fn test_bad_later_input_leaves_earlier_slots_empty() {
        let key = Key::generate(true);
        let mut inputs = vec![
            input(DATA, vec![signer(&key.public_key())]),
            input("zz", vec![signer(&key.public_key())]),
        ];
        let before = inputs.clone();

        assert!(sign_data(&mut inputs, &[key]).is_err());
        assert_eq!(inputs, before);
        assert!(inputs[0].signers[0].signed_data.is_none());
    }

    #[test]
    fn test_request_json_preserves_unknown_fields() {
        let key = Key::generate(true);
        let data = json!({
            "reference_id": "ref-123",
            "more_signatures_needed": true,
            "encrypted_passphrase": {
                "passphrase": "AAAA",
                "signer_address": "2N...",
                "signer_public_key": key.public_key()
            },
            "inputs": [{
                "input_no": 0,
                "data_to_sign": DATA,
                "signatures_needed": 2,
                "signers": [
                    { "signer_address": "2N...", "signer_public_key": key.public_key(), "signed_data": null },
                    { "signer_public_key": "03ff", "signed_data": null }
                ]
            }]
        });

        let mut request = SigningRequest::from_value(data).unwrap();
        assert_eq!(request.pending_signers(), 2);
        assert_eq!(request.sign(&[key]).unwrap(), 1);
        assert_eq!(request.pending_signers(), 1);
        assert!(!request.is_fully_signed());

        let out: Value = serde_json::from_str(&request.to_signature_data().unwrap()).unwrap();
        assert_eq!(out["reference_id"], "ref-123");
        assert_eq!(out["more_signatures_needed"], true);
        assert_eq!(out["encrypted_passphrase"]["signer_address"], "2N...");
        assert_eq!(out["inputs"][0]["input_no"], 0);
        assert_eq!(out["inputs"][0]["signatures_needed"], 2);
        assert!(out["inputs"][0]["signers"][0]["signed_data"].is_string());
        assert!(out["inputs"][0]["signers"][1]["signed_data"].is_null());
    }

    #[test]
    fn test_malformed_request() {
        assert!(matches!(
            SigningRequest::from_json(r#"{"inputs": [{"signers": []}]}"#),
            Err(SignError::MalformedRequest(_))
        ));
        assert!(SigningRequest::from_json("not json").is_err());
    }
}
