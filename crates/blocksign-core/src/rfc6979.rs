//! Deterministic ECDSA nonces (RFC 6979, HMAC-SHA256)
//!
//! `k` depends only on the private scalar and the message bytes, so signing
//! needs no randomness and repeated signatures are byte-identical.
//!
//! The step letters in the comments follow RFC 6979 §3.2. No additional
//! data (personalization) is mixed in.

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the concatenation of `parts`.
fn hmac(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Derive the nonce `k ∈ [1, order - 1]` for signing `hash` with `secret`.
///
/// * `hash` - message bytes, used as given
/// * `secret` - big-endian private scalar (`int2octets`)
/// * `order` - curve order `n`
pub fn generate_k(hash: &[u8], secret: &[u8; 32], order: &BigUint) -> BigUint {
    let mut k = [0u8; 32];
    let mut v = [1u8; 32];

    // Step D
    k = hmac(&k, &[&v, &[0x00], secret, hash]);
    // Step E
    v = hmac(&k, &[&v]);
    // Step F
    k = hmac(&k, &[&v, &[0x01], secret, hash]);
    // Step G
    v = hmac(&k, &[&v]);

    // Step H: one HMAC output already covers qlen = 256 bits
    v = hmac(&k, &[&v]);
    let mut t = BigUint::from_bytes_be(&v);

    while t.bits() == 0 || &t >= order {
        k = hmac(&k, &[&v, &[0x00]]);
        v = hmac(&k, &[&v]);
        t = BigUint::from_bytes_be(&v);
    }

    k.zeroize();
    v.zeroize();
    t
}
