//! Security-specific tests.
//!
//! These tests verify:
//! 1. A wrong PIN or a mismatched signer never produces a signature
//! 2. Key material stays in the process (WIF, PIN, scalars)
//! 3. Signatures are canonical (low-S, strict DER)
//! 4. Malformed inputs don't panic

use blocksign_client::{Client, ClientError, ClientOptions, MockTransport, Params};
use blocksign_core::base58::decode_base58;
use blocksign_core::keys::{curve_order, decode_signature, WIF_VERSION_MAINNET};
use blocksign_core::{encrypt, pin_to_aes_key, Key, KeyError, SigningRequest};
use rand::{Rng, RngCore};
use serde_json::{json, Value};

const ITERATIONS: u32 = 16;
const PASSPHRASE: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90";
const DATA: &str = "7e57da7a7e57da7a7e57da7a7e57da7a7e57da7a7e57da7a7e57da7a7e57da7a";

fn client_with(pin: &str, mock: MockTransport) -> Client<MockTransport> {
    let options = ClientOptions {
        api_key: "key".into(),
        pin: Some(pin.into()),
        pbkdf2_iterations: ITERATIONS,
        ..Default::default()
    };
    Client::new(options, mock).unwrap()
}

fn withdrawal_body(passphrase_ct: &str, signer_public_key: &str, slot: &str) -> String {
    json!({
        "status": "success",
        "data": {
            "reference_id": "sec-1",
            "encrypted_passphrase": {
                "passphrase": passphrase_ct,
                "signer_public_key": signer_public_key
            },
            "inputs": [{
                "data_to_sign": DATA,
                "signers": [{ "signer_public_key": slot, "signed_data": null }]
            }]
        }
    })
    .to_string()
}

// ============================================================================
// 1. Wrong PIN / mismatched signer
// ============================================================================

#[test]
fn test_wrong_pin_never_finalizes() {
    let real = pin_to_aes_key("correct-pin", ITERATIONS).unwrap();
    let ct = encrypt(PASSPHRASE.as_bytes(), &real).unwrap();
    let pk = Key::from_passphrase(PASSPHRASE).unwrap().public_key();

    for wrong in ["wrong-pin", "correct-pi", "Correct-pin", "0000"] {
        let mut mock = MockTransport::new();
        mock.mock("withdraw", withdrawal_body(&ct, &pk, &pk));
        mock.mock("sign_and_finalize_withdrawal", r#"{"status":"success","data":{}}"#);
        let client = client_with(wrong, mock);

        let result = client.execute("withdraw", Params::new());
        // Padding usually catches it; if not, the derived key cannot match
        assert!(
            matches!(
                result,
                Err(ClientError::InvalidPin)
                    | Err(ClientError::PublicKeyMismatch { .. })
                    | Err(ClientError::Key(_))
            ),
            "pin {:?} gave {:?}",
            wrong,
            result
        );
        assert!(client
            .transport()
            .sent_to("sign_and_finalize_withdrawal")
            .is_empty());
    }
}

#[test]
fn test_mismatched_signer_never_finalizes() {
    let aes = pin_to_aes_key("123456", ITERATIONS).unwrap();
    let ct = encrypt(PASSPHRASE.as_bytes(), &aes).unwrap();
    let ours = Key::from_passphrase(PASSPHRASE).unwrap().public_key();
    let impostor = Key::generate(true).public_key();

    let mut mock = MockTransport::new();
    mock.mock("withdraw", withdrawal_body(&ct, &impostor, &ours));
    mock.mock("sign_and_finalize_withdrawal", r#"{"status":"success","data":{}}"#);
    let client = client_with("123456", mock);

    match client.execute("withdraw", Params::new()) {
        Err(ClientError::PublicKeyMismatch { expected, actual }) => {
            assert_eq!(expected, impostor);
            assert_eq!(actual, ours);
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
    assert_eq!(client.transport().sent().len(), 1);
}

// ============================================================================
// 2. Key material stays local
// ============================================================================

#[test]
fn test_sweep_never_sends_wif() {
    let key = Key::generate(false);
    let wif = key.to_wif(WIF_VERSION_MAINNET);
    let pk = key.public_key();

    let mut mock = MockTransport::new();
    mock.mock("sweep_from_address", withdrawal_body("", &pk, &pk));
    mock.mock("sign_and_finalize_sweep", r#"{"status":"success","data":{}}"#);
    let client = Client::new(ClientOptions::default(), mock).unwrap();

    client
        .execute(
            "sweep_from_address",
            Params::new()
                .with("to_address", "2Ndest")
                .with("private_key", wif.as_str()),
        )
        .unwrap();

    let scalar = key.private_key();
    for request in client.transport().sent() {
        for (name, value) in request.params.iter() {
            assert_ne!(name, "private_key");
            assert!(!value.contains(wif.as_str()), "WIF leaked in {}", name);
            assert!(!value.contains(scalar.as_str()), "scalar leaked in {}", name);
        }
    }
}

#[test]
fn test_v2_withdraw_never_sends_pin() {
    let aes = pin_to_aes_key("864213", ITERATIONS).unwrap();
    let ct = encrypt(PASSPHRASE.as_bytes(), &aes).unwrap();
    let pk = Key::from_passphrase(PASSPHRASE).unwrap().public_key();

    let mut mock = MockTransport::new();
    mock.mock("withdraw", withdrawal_body(&ct, &pk, &pk));
    mock.mock("sign_and_finalize_withdrawal", r#"{"status":"success","data":{}}"#);
    let client = client_with("864213", mock);
    client.execute("withdraw", Params::new()).unwrap();

    for request in client.transport().sent() {
        assert!(!request.params.contains("pin"));
        assert!(request.params.iter().all(|(_, v)| !v.contains("864213")));
    }
}

#[test]
fn test_debug_output_hides_secrets() {
    let key = Key::from_passphrase(PASSPHRASE).unwrap();
    let printed = format!("{:?}", key);
    assert!(!printed.contains(key.private_key().as_str()));

    let aes = pin_to_aes_key("555555", ITERATIONS).unwrap();
    assert!(!format!("{:?}", aes).contains(aes.as_base64()));

    let params = Params::new().with("pin", "555555").with("private_key", "5Kxyz");
    let printed = format!("{:?}", params);
    assert!(!printed.contains("555555"));
    assert!(!printed.contains("5Kxyz"));
}

// ============================================================================
// 3. Canonical signatures
// ============================================================================

#[test]
fn test_signatures_are_low_s_strict_der() {
    let half_order = curve_order() >> 1u32;
    let mut rng = rand::thread_rng();

    for _ in 0..64 {
        let key = Key::generate(rng.gen());
        let mut data = [0u8; 32];
        rng.fill_bytes(&mut data);
        let data_hex = hex::encode(data);

        let sig = key.sign(&data_hex).unwrap();
        let (_, s) = decode_signature(&sig).unwrap();
        assert!(s <= half_order, "high-S signature produced");

        // Strict DER as parsed by libsecp256k1
        let der = hex::decode(&sig).unwrap();
        assert!(secp256k1::ecdsa::Signature::from_der(&der).is_ok());
        assert!(key.verify(&data_hex, &sig).unwrap());
    }
}

// ============================================================================
// 4. Malformed input
// ============================================================================

#[test]
fn test_malformed_wif_rejected() {
    for wif in ["", "0", "I1l", "5Hue", "1111111111", "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTO"] {
        assert!(Key::from_wif(wif).is_err(), "{:?} accepted", wif);
        assert!(Key::from_wif_checked(wif).is_err(), "{:?} accepted", wif);
    }
}

#[test]
fn test_checksum_tamper_detected() {
    let wif = Key::generate(true).to_wif(WIF_VERSION_MAINNET);
    let mut chars: Vec<char> = wif.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'z' { 'y' } else { 'z' };
    let tampered: String = chars.into_iter().collect();

    assert!(matches!(
        Key::from_wif_checked(&tampered),
        Err(KeyError::InvalidWifChecksum) | Err(KeyError::InvalidWif(_))
    ));
}

#[test]
fn test_random_base58_does_not_panic() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let len = rng.gen_range(0..80);
        let s: String = (0..len)
            .map(|_| char::from(rng.gen_range(0x20u8..0x7f)))
            .collect();
        let _ = decode_base58(&s);
        let _ = Key::from_wif(&s);
        let _ = Key::from_wif_checked(&s);
    }
}

#[test]
fn test_malformed_signing_requests_do_not_panic() {
    let key = Key::generate(true);
    let bodies: Vec<Value> = vec![
        json!(null),
        json!([]),
        json!({ "inputs": "nope" }),
        json!({ "inputs": [{ "data_to_sign": 5, "signers": [] }] }),
        json!({ "inputs": [{ "data_to_sign": "zz", "signers": [{ "signer_public_key": key.public_key() }] }] }),
        json!({ "inputs": [{ "data_to_sign": "", "signers": [{ "signer_public_key": key.public_key() }] }] }),
    ];

    for body in bodies {
        if let Ok(mut request) = SigningRequest::from_value(body) {
            assert!(request.sign(std::slice::from_ref(&key)).is_err());
        }
    }
}
