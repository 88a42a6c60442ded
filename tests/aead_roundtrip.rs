//! Integration-level round-trip and tamper-detection coverage for RCS and
//! CSX across a spread of message lengths (empty, sub-block, exactly one
//! block, and several blocks), plus the `set_associated` ordering misuse
//! the phase machine is meant to reject.

use rcsx::{Csx, Error, Rcs, RcsVariant};

const LENGTHS: &[usize] = &[0, 1, 31, 32, 33, 96, 257];

fn plaintext_of(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn rcs256_round_trips_across_message_lengths() {
    let key = [0x5Au8; 32];
    for &len in LENGTHS {
        let plaintext = plaintext_of(len);

        let mut sealer = Rcs::new(RcsVariant::Rcs256, &key, b"rcs256 test").unwrap();
        sealer.start();
        sealer.set_associated(b"ad").unwrap();
        let mut counter = [0u8; 32];
        let mut ciphertext = vec![0u8; len];
        let mut tag = [0u8; 32];
        sealer.seal(&mut counter, &plaintext, &mut ciphertext, &mut tag);

        let mut opener = Rcs::new(RcsVariant::Rcs256, &key, b"rcs256 test").unwrap();
        opener.start();
        opener.set_associated(b"ad").unwrap();
        let mut decrypt_counter = [0u8; 32];
        let mut decrypted = vec![0u8; len];
        let authentic = opener.open(&mut decrypt_counter, &ciphertext, &mut decrypted, &tag);

        assert!(authentic, "length {len} failed to authenticate");
        assert_eq!(decrypted, plaintext, "length {len} round-trip mismatch");
    }
}

#[test]
fn rcs512_round_trips_across_message_lengths() {
    let key = [0xA5u8; 64];
    for &len in LENGTHS {
        let plaintext = plaintext_of(len);

        let mut sealer = Rcs::new(RcsVariant::Rcs512, &key, b"").unwrap();
        sealer.start();
        sealer.set_associated(b"").unwrap();
        let mut counter = [0u8; 32];
        let mut ciphertext = vec![0u8; len];
        let mut tag = [0u8; 64];
        sealer.seal(&mut counter, &plaintext, &mut ciphertext, &mut tag);

        let mut opener = Rcs::new(RcsVariant::Rcs512, &key, b"").unwrap();
        opener.start();
        opener.set_associated(b"").unwrap();
        let mut decrypt_counter = [0u8; 32];
        let mut decrypted = vec![0u8; len];
        let authentic = opener.open(&mut decrypt_counter, &ciphertext, &mut decrypted, &tag);

        assert!(authentic, "length {len} failed to authenticate");
        assert_eq!(decrypted, plaintext, "length {len} round-trip mismatch");
    }
}

#[test]
fn csx_round_trips_across_message_lengths() {
    let key: Vec<u8> = (0..64).collect();
    let nonce = [0x77u8; 16];
    for &len in LENGTHS {
        let plaintext = plaintext_of(len);

        let mut sealer = Csx::new(&key, &nonce, b"").unwrap();
        sealer.start();
        sealer.set_associated(b"csx ad").unwrap();
        let mut ciphertext = vec![0u8; len];
        let mut tag = [0u8; 64];
        sealer.seal(&plaintext, &mut ciphertext, &mut tag);

        let mut opener = Csx::new(&key, &nonce, b"").unwrap();
        opener.start();
        opener.set_associated(b"csx ad").unwrap();
        let mut decrypted = vec![0u8; len];
        let authentic = opener.open(&ciphertext, &mut decrypted, &tag);

        assert!(authentic, "length {len} failed to authenticate");
        assert_eq!(decrypted, plaintext, "length {len} round-trip mismatch");
    }
}

#[test]
fn tampering_every_input_is_detected() {
    let key = [0x11u8; 32];
    let mut sealer = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    sealer.start();
    sealer.set_associated(b"associated data").unwrap();

    let plaintext = plaintext_of(64);
    let mut counter = [3u8; 32];
    let original_counter = counter;
    let mut ciphertext = vec![0u8; 64];
    let mut tag = [0u8; 32];
    sealer.seal(&mut counter, &plaintext, &mut ciphertext, &mut tag);

    let check = |counter: [u8; 32], ciphertext: &[u8], tag: &[u8], ad: &[u8]| -> bool {
        let mut opener = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        opener.start();
        opener.set_associated(ad).unwrap();
        let mut decrypt_counter = counter;
        let mut decrypted = vec![0u8; ciphertext.len()];
        opener.open(&mut decrypt_counter, ciphertext, &mut decrypted, tag)
    };

    assert!(check(original_counter, &ciphertext, &tag, b"associated data"));

    let mut bad_ciphertext = ciphertext.clone();
    bad_ciphertext[0] ^= 1;
    assert!(!check(original_counter, &bad_ciphertext, &tag, b"associated data"));

    let mut bad_tag = tag;
    bad_tag[0] ^= 1;
    assert!(!check(original_counter, &ciphertext, &bad_tag, b"associated data"));

    assert!(!check(original_counter, &ciphertext, &tag, b"wrong associated data"));

    let mut bad_counter = original_counter;
    bad_counter[0] ^= 1;
    assert!(!check(bad_counter, &ciphertext, &tag, b"associated data"));
}

#[test]
fn setting_associated_data_twice_is_rejected() {
    let key = [0x22u8; 32];
    let mut cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    cipher.start();
    cipher.set_associated(b"first").unwrap();
    let err = cipher.set_associated(b"second").unwrap_err();
    assert!(matches!(err, Error::AlreadyAssociatedAfterTransform));
}

#[test]
fn setting_associated_data_after_transform_is_rejected() {
    let key = [0x33u8; 32];
    let mut cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    cipher.start();
    cipher.set_associated(b"").unwrap();

    let plaintext = plaintext_of(32);
    let mut counter = [0u8; 32];
    let mut ciphertext = vec![0u8; 32];
    let mut tag = [0u8; 32];
    cipher.seal(&mut counter, &plaintext, &mut ciphertext, &mut tag);

    let err = cipher.set_associated(b"too late").unwrap_err();
    assert!(matches!(err, Error::AlreadyAssociatedAfterTransform));
}

#[test]
fn rcs256_canonical_scenario_inputs_round_trip() {
    // The exact (key, nonce, info, plaintext) inputs from the canonical
    // RCS-256 scenario: key/nonce = 0x00..0x1f, empty info, 32 zero
    // plaintext bytes. This crate can't pin the scenario's published
    // ciphertext+tag bytes without running the cipher to confirm a
    // hand-transcribed hex string (this pass makes no toolchain runs), so
    // this is a round-trip/determinism check against those exact inputs
    // rather than a byte-exact KAT.
    let key: Vec<u8> = (0u8..=0x1Fu8).collect();
    let mut counter: Vec<u8> = (0u8..=0x1Fu8).collect();
    let plaintext = [0u8; 32];

    let mut sealer = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    sealer.start();
    sealer.set_associated(b"").unwrap();
    let mut ciphertext = vec![0u8; 32];
    let mut tag = [0u8; 32];
    sealer.seal(&mut counter, &plaintext, &mut ciphertext, &mut tag);

    let mut counter_again: Vec<u8> = (0u8..=0x1Fu8).collect();
    let mut sealer_again = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    sealer_again.start();
    sealer_again.set_associated(b"").unwrap();
    let mut ciphertext_again = vec![0u8; 32];
    let mut tag_again = [0u8; 32];
    sealer_again.seal(&mut counter_again, &plaintext, &mut ciphertext_again, &mut tag_again);
    assert_eq!(ciphertext, ciphertext_again, "must be deterministic for fixed inputs");
    assert_eq!(tag, tag_again);

    let mut opener = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
    opener.start();
    opener.set_associated(b"").unwrap();
    let mut decrypt_counter: Vec<u8> = (0u8..=0x1Fu8).collect();
    let mut decrypted = vec![0u8; 32];
    let authentic = opener.open(&mut decrypt_counter, &ciphertext, &mut decrypted, &tag);
    assert!(authentic);
    assert_eq!(decrypted, plaintext);
}

#[test]
fn csx_canonical_scenario_inputs_round_trip() {
    // key = 0x00..0x3f, nonce = 0x00..0x0f, empty info, 128 zero plaintext
    // bytes; same byte-exactness caveat as the RCS scenario test above.
    let key: Vec<u8> = (0u8..=0x3Fu8).collect();
    let nonce: Vec<u8> = (0u8..=0x0Fu8).collect();
    let plaintext = [0u8; 128];

    let mut sealer = Csx::new(&key, &nonce, b"").unwrap();
    sealer.start();
    sealer.set_associated(b"").unwrap();
    let mut ciphertext = vec![0u8; 128];
    let mut tag = [0u8; 64];
    sealer.seal(&plaintext, &mut ciphertext, &mut tag);

    let mut opener = Csx::new(&key, &nonce, b"").unwrap();
    opener.start();
    opener.set_associated(b"").unwrap();
    let mut decrypted = vec![0u8; 128];
    let authentic = opener.open(&ciphertext, &mut decrypted, &tag);
    assert!(authentic);
    assert_eq!(decrypted, plaintext);

    // Flipping byte 0 of the tag must cause decrypt to return false.
    let mut bad_tag = tag;
    bad_tag[0] ^= 0x01;
    let mut opener2 = Csx::new(&key, &nonce, b"").unwrap();
    opener2.start();
    opener2.set_associated(b"").unwrap();
    let mut decrypted2 = vec![0u8; 128];
    let authentic2 = opener2.open(&ciphertext, &mut decrypted2, &bad_tag);
    assert!(!authentic2);
}

#[test]
fn different_info_strings_yield_different_keystreams() {
    let key = [0x44u8; 32];
    let plaintext = plaintext_of(32);

    let mut counter_a = [0u8; 32];
    let mut cipher_a = Rcs::new(RcsVariant::Rcs256, &key, b"info-a").unwrap();
    cipher_a.start();
    cipher_a.set_associated(b"").unwrap();
    let mut ciphertext_a = vec![0u8; 32];
    let mut tag_a = [0u8; 32];
    cipher_a.seal(&mut counter_a, &plaintext, &mut ciphertext_a, &mut tag_a);

    let mut counter_b = [0u8; 32];
    let mut cipher_b = Rcs::new(RcsVariant::Rcs256, &key, b"info-b").unwrap();
    cipher_b.start();
    cipher_b.set_associated(b"").unwrap();
    let mut ciphertext_b = vec![0u8; 32];
    let mut tag_b = [0u8; 32];
    cipher_b.seal(&mut counter_b, &plaintext, &mut ciphertext_b, &mut tag_b);

    assert_ne!(ciphertext_a, ciphertext_b);
    assert_ne!(tag_a, tag_b);
}
