#![no_main]

use blocksign_core::Key;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Both WIF importers must reject garbage without panicking.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Key::from_wif(s);

        // A checksum-verified key must export back to a parseable WIF
        if let Ok(key) = Key::from_wif_checked(s) {
            let again = key.to_wif(0x80);
            Key::from_wif_checked(&again).expect("exported WIF re-imports");
        }
    }
});
