//! secp256k1 signing keys
//!
//! A [`Key`] owns one private scalar, its public point and the flag that
//! selects compressed or uncompressed point encoding. Keys are created from
//! randomness, a hex scalar, a WIF string or a hex passphrase, and are
//! immutable afterwards.
//!
//! # Signing
//!
//! Signatures are plain ECDSA with an RFC 6979 nonce, normalized to low-S
//! (BIP-62) and DER encoded. The message integer is the signed data itself,
//! reduced modulo the curve order; no hashing happens here.

use crate::base58;
use crate::memory::SecretScalar;
use crate::rfc6979;
use num_bigint::BigUint;
use secp256k1::ecdsa::Signature;
use secp256k1::{constants, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Minimum passphrase length accepted by [`Key::from_passphrase`]
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// WIF version byte for Bitcoin mainnet private keys
pub const WIF_VERSION_MAINNET: u8 = 0x80;

/// WIF version byte for Bitcoin testnet private keys
pub const WIF_VERSION_TESTNET: u8 = 0xef;

/// Number of checksum bytes trailing a WIF payload
const WIF_CHECKSUM_LEN: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Must provide passphrase at least {MIN_PASSPHRASE_LEN} characters long")]
    PassphraseTooShort,
    #[error("Passphrase is not valid hex")]
    InvalidPassphrase,
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid data to sign: {0}")]
    InvalidSignatureInput(String),
    #[error("Invalid WIF: {0}")]
    InvalidWif(String),
    #[error("WIF checksum mismatch")]
    InvalidWifChecksum,
    #[error("Invalid DER signature: {0}")]
    InvalidSignature(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error(transparent)]
    Base58(#[from] base58::Base58Error),
}

/// The secp256k1 group order `n`.
pub fn curve_order() -> BigUint {
    BigUint::from_bytes_be(&constants::CURVE_ORDER)
}

/// Left-pad an integer below `2^256` into 32 big-endian bytes.
fn to_32_bytes(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Decode the hex data handed to [`Key::sign`] / [`Key::verify`].
fn decode_message(data_hex: &str) -> Result<Vec<u8>, KeyError> {
    if data_hex.is_empty() {
        return Err(KeyError::InvalidSignatureInput("empty".into()));
    }
    hex::decode(data_hex).map_err(|e| KeyError::InvalidSignatureInput(e.to_string()))
}

/// An owned secp256k1 keypair.
pub struct Key {
    secret: SecretScalar,
    public: PublicKey,
    compressed: bool,
}

impl Key {
    /// Generate a uniformly random key in `[1, n - 1]`.
    pub fn generate(compressed: bool) -> Self {
        let secp = Secp256k1::new();
        let (mut secret_key, public) = secp.generate_keypair(&mut rand::thread_rng());
        let key = Self {
            secret: SecretScalar::new(&secret_key.secret_bytes()),
            public,
            compressed,
        };
        secret_key.non_secure_erase();
        key
    }

    /// Import a hex scalar, or generate a random key when `None`.
    pub fn new(private_key_hex: Option<&str>, compressed: bool) -> Result<Self, KeyError> {
        match private_key_hex {
            Some(hex) => Self::from_hex(hex, compressed),
            None => Ok(Self::generate(compressed)),
        }
    }

    /// Import a hex scalar. Shorter inputs are left-padded with zeros.
    pub fn from_hex(private_key_hex: &str, compressed: bool) -> Result<Self, KeyError> {
        if private_key_hex.is_empty() || private_key_hex.len() > 64 {
            return Err(KeyError::InvalidPrivateKey(format!(
                "expected 1..=64 hex digits, got {}",
                private_key_hex.len()
            )));
        }

        let mut padded = Zeroizing::new(format!("{:0>64}", private_key_hex));
        let mut bytes = Zeroizing::new([0u8; 32]);
        let decoded = hex::decode_to_slice(padded.as_bytes(), &mut bytes[..])
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()));
        padded.zeroize();
        decoded?;

        Self::from_bytes(&bytes, compressed)
    }

    /// Import a raw 32-byte big-endian scalar.
    pub fn from_bytes(secret: &[u8; 32], compressed: bool) -> Result<Self, KeyError> {
        let secp = Secp256k1::new();
        let mut secret_key = SecretKey::from_slice(secret)
            .map_err(|_| KeyError::InvalidPrivateKey("scalar out of range".into()))?;
        let public = PublicKey::from_secret_key(&secp, &secret_key);
        secret_key.non_secure_erase();

        Ok(Self {
            secret: SecretScalar::new(secret),
            public,
            compressed,
        })
    }

    /// Brain-wallet style key: SHA-256 of the bytes a hex passphrase encodes.
    ///
    /// The passphrase decrypted from the remote service is a hex string; the
    /// hash input is the decoded bytes, not the ASCII text.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, KeyError> {
        if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(KeyError::PassphraseTooShort);
        }

        let raw = Zeroizing::new(hex::decode(passphrase).map_err(|_| KeyError::InvalidPassphrase)?);
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&Sha256::digest(raw.as_slice()));

        Self::from_bytes(&seed, true)
    }

    /// Import a Wallet Import Format key.
    ///
    /// Layout: `version(1) || scalar(32) || [0x01] || checksum(4)`. The
    /// checksum is **not** verified here; see [`Key::from_wif_checked`].
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(base58::decode_base58_bytes(wif)?);
        Self::from_wif_payload(&decoded)
    }

    /// Import a WIF key after verifying its Base58Check checksum.
    pub fn from_wif_checked(wif: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(base58::decode_base58_bytes(wif)?);
        if decoded.len() < 1 + 32 + WIF_CHECKSUM_LEN {
            return Err(KeyError::InvalidWif(format!(
                "{} bytes is too short",
                decoded.len()
            )));
        }

        let (payload, checksum) = decoded.split_at(decoded.len() - WIF_CHECKSUM_LEN);
        if base58::checksum(payload) != checksum {
            return Err(KeyError::InvalidWifChecksum);
        }

        Self::from_wif_payload(&decoded)
    }

    fn from_wif_payload(decoded: &[u8]) -> Result<Self, KeyError> {
        if decoded.len() < 33 {
            return Err(KeyError::InvalidWif(format!(
                "{} bytes is too short",
                decoded.len()
            )));
        }

        let mut scalar = Zeroizing::new([0u8; 32]);
        scalar.copy_from_slice(&decoded[1..33]);

        // Compressed only when a marker byte sits between scalar and checksum
        let after_version = decoded.len() - 1;
        let compressed = after_version.saturating_sub(WIF_CHECKSUM_LEN) > 32 && decoded[33] == 0x01;

        Self::from_bytes(&scalar, compressed)
    }

    /// Export as Base58Check WIF under the given version byte.
    pub fn to_wif(&self, version: u8) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(38));
        payload.push(version);
        payload.extend_from_slice(self.secret.as_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        let checksum = base58::checksum(&payload);
        payload.extend_from_slice(&checksum);

        let hex = Zeroizing::new(hex::encode(payload.as_slice()));
        // Hex produced just above is always valid
        base58::encode_base58(&hex).unwrap_or_default()
    }

    /// Whether the public key serializes in 33-byte compressed form.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Hex of the public point, compressed or uncompressed per the key's flag.
    pub fn public_key(&self) -> String {
        if self.compressed {
            hex::encode(self.public.serialize())
        } else {
            hex::encode(self.public.serialize_uncompressed())
        }
    }

    /// 64-digit lowercase hex of the private scalar. Never log this.
    pub fn private_key(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret.as_bytes()))
    }

    /// Sign hex-encoded data, returning a low-S DER signature as hex.
    pub fn sign(&self, data_hex: &str) -> Result<String, KeyError> {
        let data = decode_message(data_hex)?;
        let n = curve_order();

        let k = rfc6979::generate_k(&data, self.secret.as_bytes(), &n);
        let z = BigUint::from_bytes_be(&data) % &n;
        let d = BigUint::from_bytes_be(self.secret.as_bytes());

        // r = x(k·G) mod n
        let secp = Secp256k1::new();
        let mut k_bytes = to_32_bytes(&k);
        let nonce_key = SecretKey::from_slice(&k_bytes);
        k_bytes.zeroize();
        let mut nonce_key =
            nonce_key.map_err(|_| KeyError::SigningFailed("nonce out of range".into()))?;
        let point = PublicKey::from_secret_key(&secp, &nonce_key).serialize_uncompressed();
        nonce_key.non_secure_erase();

        let r = BigUint::from_bytes_be(&point[1..33]) % &n;
        if r.bits() == 0 {
            return Err(KeyError::SigningFailed("r is zero".into()));
        }

        // s = k⁻¹·(z + r·d) mod n, with k⁻¹ = k^(n-2) since n is prime
        let k_inv = k.modpow(&(&n - 2u32), &n);
        let mut s = (k_inv * ((z + &r * d) % &n)) % &n;
        if s.bits() == 0 {
            return Err(KeyError::SigningFailed("s is zero".into()));
        }

        // BIP-62: keep only the lower of s and n - s
        if s > (&n >> 1u32) {
            s = &n - s;
        }

        encode_signature(&r, &s)
    }

    /// Verify a DER signature (hex) over hex data against this key.
    ///
    /// Signatures with a high S value are accepted after normalization.
    pub fn verify(&self, data_hex: &str, signature_hex: &str) -> Result<bool, KeyError> {
        let data = decode_message(data_hex)?;
        let z = BigUint::from_bytes_be(&data) % curve_order();
        let message = Message::from_digest(to_32_bytes(&z));

        let der = hex::decode(signature_hex).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
        let mut signature =
            Signature::from_der(&der).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
        signature.normalize_s();

        let secp = Secp256k1::verification_only();
        Ok(secp.verify_ecdsa(&message, &signature, &self.public).is_ok())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("public_key", &self.public_key())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// DER-encode `(r, s)` as hex.
pub fn encode_signature(r: &BigUint, s: &BigUint) -> Result<String, KeyError> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&to_32_bytes(r));
    compact[32..].copy_from_slice(&to_32_bytes(s));
    let signature = Signature::from_compact(&compact)
        .map_err(|e| KeyError::SigningFailed(e.to_string()))?;
    Ok(hex::encode(signature.serialize_der().to_vec()))
}

/// Decode a hex DER signature into its `(r, s)` components.
pub fn decode_signature(signature_hex: &str) -> Result<(BigUint, BigUint), KeyError> {
    let der = hex::decode(signature_hex).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    let signature =
        Signature::from_der(&der).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    let compact = signature.serialize_compact();
    Ok((
        BigUint::from_bytes_be(&compact[..32]),
        BigUint::from_bytes_be(&compact[32..]),
    ))
}
