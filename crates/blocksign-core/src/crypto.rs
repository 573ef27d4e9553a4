//! PIN-derived passphrase encryption
//!
//! The remote service stores each wallet's signing passphrase encrypted
//! under a key derived from the user's secret PIN. This module derives that
//! key and decrypts the passphrase back into a signing [`Key`].
//!
//! # Compatibility Notes
//!
//! - The PIN goes through PBKDF2-HMAC-SHA256 twice: first to 16 bytes, then
//!   the *hex text* of that result to 32 bytes. Both passes use an empty salt
//!   and half the requested iterations. Keys derived any other way will not
//!   decrypt server-issued passphrases.
//! - The cipher is AES-256-ECB with PKCS#7 padding. ECB leaks equality of
//!   plaintext blocks; it is kept because the server encrypts that way.
//! - A padding failure on decrypt is the only signal of a wrong PIN, so it
//!   is reported as [`CryptoError::InvalidPin`].

use crate::keys::{Key, KeyError};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256EcbEnc = ecb::Encryptor<aes::Aes256>;
type Aes256EcbDec = ecb::Decryptor<aes::Aes256>;

/// PBKDF2 iterations used when none are configured (split across two passes)
pub const DEFAULT_PIN_ITERATIONS: u32 = 2048;

/// Stage-one PBKDF2 output length (128 bits)
const STAGE_ONE_LEN: usize = 16;

/// AES-256 key length
const AES_KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid Secret PIN provided")]
    InvalidPin,
    #[error("PBKDF2 needs at least 2 iterations, got {0}")]
    InvalidIterations(u32),
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
    #[error("Encryption key must be {AES_KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Base64 AES-256 key derived from a PIN.
///
/// Cleared on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey(Zeroizing<String>);

impl AesKey {
    /// Wrap an already derived base64 key.
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self(Zeroizing::new(encoded.into()))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let bytes = Zeroizing::new(decode_b64(self.as_base64())?);
        if bytes.len() != AES_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        Ok(bytes)
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(<redacted>)")
    }
}

fn decode_b64(input: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(input)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}

/// Derive the passphrase encryption key from a secret PIN.
///
/// # Arguments
/// * `pin` - the user's secret PIN
/// * `iterations` - total PBKDF2 rounds, split evenly over both passes
///
/// # Returns
/// The base64 AES-256 key
pub fn pin_to_aes_key(pin: &str, iterations: u32) -> Result<AesKey, CryptoError> {
    if iterations < 2 {
        return Err(CryptoError::InvalidIterations(iterations));
    }
    let rounds = iterations / 2;

    let mut stage_one = Zeroizing::new([0u8; STAGE_ONE_LEN]);
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), b"", rounds, &mut stage_one[..]);

    // Re-key on the lowercase hex text, not the raw bytes
    let stage_one_hex = Zeroizing::new(hex::encode(&stage_one[..]));
    let mut stage_two = Zeroizing::new([0u8; AES_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(stage_one_hex.as_bytes(), b"", rounds, &mut stage_two[..]);

    Ok(AesKey::from_base64(STANDARD.encode(&stage_two[..])))
}

/// Decrypt base64 AES-256-ECB ciphertext.
///
/// # Errors
/// [`CryptoError::InvalidPin`] if the cipher rejects the data, which is what a
/// wrong PIN looks like.
pub fn decrypt(ciphertext_b64: &str, key: &AesKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let ciphertext = decode_b64(ciphertext_b64)?;
    let key_bytes = key.to_bytes()?;

    let cipher = Aes256EcbDec::new_from_slice(&key_bytes)
        .map_err(|_| CryptoError::InvalidKeyLength(key_bytes.len()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::InvalidPin)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt with AES-256-ECB and return base64 ciphertext.
pub fn encrypt(data: &[u8], key: &AesKey) -> Result<String, CryptoError> {
    let key_bytes = key.to_bytes()?;
    let cipher = Aes256EcbEnc::new_from_slice(&key_bytes)
        .map_err(|_| CryptoError::InvalidKeyLength(key_bytes.len()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(data);
    Ok(STANDARD.encode(ciphertext))
}

/// Decrypt a server-held passphrase and rebuild its signing key.
///
/// Plaintext that is not UTF-8 cannot be a passphrase the server issued,
/// so it is treated as a wrong PIN as well. The same goes for plaintext that
/// is not hex: a wrong key that happens to leave valid padding still ends up
/// as [`CryptoError::InvalidPin`].
pub fn extract_key(encrypted_passphrase_b64: &str, key: &AesKey) -> Result<Key, CryptoError> {
    let decrypted = decrypt(encrypted_passphrase_b64, key)?;
    let passphrase = std::str::from_utf8(&decrypted).map_err(|_| CryptoError::InvalidPin)?;
    Key::from_passphrase(passphrase).map_err(|e| match e {
        KeyError::InvalidPassphrase => CryptoError::InvalidPin,
        other => CryptoError::Key(other),
    })
}
