#![no_main]

use blocksign_core::{Key, SigningRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON must parse to Ok or Err, never panic.
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut request) = SigningRequest::from_json(s) {
        // Signing with an unrelated key touches no slot but walks every input
        let key = Key::from_bytes(&[0x11; 32], true).expect("valid scalar");
        let _ = request.sign(std::slice::from_ref(&key));
        let _ = request.to_signature_data();
    }
});
