#![no_main]

use blocksign_core::base58::{decode_base58, encode_base58};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // decode_base58 must return Ok or Err for any string, never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(hex) = decode_base58(s) {
            // Whatever decodes must re-encode
            encode_base58(&hex).expect("decoded hex re-encodes");
        }
    }
});
