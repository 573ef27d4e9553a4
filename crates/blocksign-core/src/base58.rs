//! Base58 over arbitrary-precision integers
//!
//! Hex in, hex out. Each leading zero byte of the input is carried as a
//! leading `'1'` in the encoding, since the integer conversion alone would
//! drop it.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bitcoin alphabet: alphanumerics without `0`, `O`, `I` and `l`.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("Invalid base58 character {ch:?} at position {position}")]
    InvalidBase58Char { ch: char, position: usize },
    #[error("Invalid hex input: {0}")]
    InvalidHex(String),
}

/// Convert an integer to base58 by repeated division. Zero encodes as `""`.
pub fn int_to_base58(value: &BigUint) -> String {
    if value.bits() == 0 {
        return String::new();
    }
    value
        .to_radix_be(58)
        .into_iter()
        .map(|digit| ALPHABET[digit as usize] as char)
        .collect()
}

/// Parse a base58 string into an integer.
pub fn base58_to_int(s: &str) -> Result<BigUint, Base58Error> {
    let digits = s
        .chars()
        .enumerate()
        .map(|(position, ch)| {
            ALPHABET
                .iter()
                .position(|&a| a as char == ch)
                .map(|idx| idx as u8)
                .ok_or(Base58Error::InvalidBase58Char { ch, position })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    if digits.is_empty() {
        return Ok(BigUint::default());
    }

    // Every digit was checked against the alphabet above
    Ok(BigUint::from_radix_be(&digits, 58).unwrap_or_default())
}

/// Encode a hex string, prepending one `'1'` per leading `00` byte.
pub fn encode_base58(hex: &str) -> Result<String, Base58Error> {
    // parse_bytes alone would accept a sign and `_` separators
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Base58Error::InvalidHex(hex.to_string()));
    }

    let leading_zero_bytes = hex.chars().take_while(|&c| c == '0').count() / 2;

    let value = if hex.is_empty() {
        BigUint::default()
    } else {
        BigUint::parse_bytes(hex.as_bytes(), 16)
            .ok_or_else(|| Base58Error::InvalidHex(hex.to_string()))?
    };

    let mut out = "1".repeat(leading_zero_bytes);
    out.push_str(&int_to_base58(&value));
    Ok(out)
}

/// Decode to lowercase hex, prepending one `00` per leading `'1'`.
pub fn decode_base58(s: &str) -> Result<String, Base58Error> {
    let value = base58_to_int(s)?;

    let mut hex = value.to_str_radix(16);
    if hex.len() % 2 == 1 {
        hex.insert(0, '0');
    }
    // A zero value has no bytes of its own; the leading '1's supply them
    if hex == "00" {
        hex.clear();
    }

    let leading_ones = s.chars().take_while(|&c| c == '1').count();
    Ok(format!("{}{}", "00".repeat(leading_ones), hex))
}

/// Decode straight to bytes.
pub fn decode_base58_bytes(s: &str) -> Result<Vec<u8>, Base58Error> {
    let hex = decode_base58(s)?;
    // decode_base58 always yields an even number of hex digits
    hex::decode(&hex).map_err(|e| Base58Error::InvalidHex(e.to_string()))
}

/// Base58Check checksum: first four bytes of SHA256(SHA256(payload)).
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}
