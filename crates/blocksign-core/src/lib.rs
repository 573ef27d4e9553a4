//! BlockSign Core
//!
//! Client-side key handling for authorizing withdrawals against a remote
//! wallet service. Private keys never leave the process.
//!
//! # Signing Flow
//!
//! 1. The PIN is stretched into an AES key ([`crypto::pin_to_aes_key`]).
//! 2. The server's encrypted passphrase is decrypted and hashed into a
//!    signing [`Key`] ([`crypto::extract_key`]).
//! 3. Every input slot owned by that key gets a deterministic, low-S DER
//!    signature ([`signer::sign_data`]).

pub mod base58;
pub mod crypto;
pub mod keys;
pub mod memory;
pub mod rfc6979;
pub mod signer;

pub use crypto::{decrypt, encrypt, extract_key, pin_to_aes_key, AesKey, CryptoError};
pub use keys::{Key, KeyError};
pub use signer::{sign_data, EncryptedPassphrase, Input, SignError, Signer, SigningRequest};
