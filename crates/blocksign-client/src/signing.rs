//! Client-side signing of withdrawal and sweep requests

use crate::ClientError;
use blocksign_core::{extract_key, AesKey, Key, SignError, SigningRequest};
use std::slice;

/// Recover the wallet key from the request's encrypted passphrase and sign
/// every input it owns.
///
/// The derived public key must equal `signer_public_key`; on mismatch
/// nothing is signed.
pub fn sign_withdrawal(
    request: &mut SigningRequest,
    aes_key: &AesKey,
) -> Result<usize, ClientError> {
    let encrypted = request.encrypted_passphrase.as_ref().ok_or_else(|| {
        ClientError::Sign(SignError::MalformedRequest(
            "missing encrypted_passphrase".into(),
        ))
    })?;

    let key = extract_key(&encrypted.passphrase, aes_key)?;
    let actual = key.public_key();
    if actual != encrypted.signer_public_key {
        log::warn!(
            "decrypted key {} does not match requested signer {}",
            actual,
            encrypted.signer_public_key
        );
        return Err(ClientError::PublicKeyMismatch {
            expected: encrypted.signer_public_key.clone(),
            actual,
        });
    }

    sign_with(request, &key)
}

/// Sign a sweep request with the caller's WIF-derived key.
pub fn sign_sweep(request: &mut SigningRequest, key: &Key) -> Result<usize, ClientError> {
    sign_with(request, key)
}

fn sign_with(request: &mut SigningRequest, key: &Key) -> Result<usize, ClientError> {
    let added = request.sign(slice::from_ref(key))?;
    if added == 0 {
        log::warn!("no input is waiting for a signature from {}", key.public_key());
    } else {
        log::info!(
            "signed {} input slot(s), {} still pending",
            added,
            request.pending_signers()
        );
    }
    Ok(added)
}
