//! KPA coverage for message lengths that land exactly on an 8-leaf block
//! boundary (`8 * rate` bytes) and just past it — the one-leaf-at-a-time
//! round-robin fill in `Kpa::update` only gets exercised fully once input
//! crosses a full round of all 8 leaves.

use rcsx::Kpa;

const RATE_256: usize = 136;

fn tag_for(message_len: usize) -> Vec<u8> {
    let key = b"kpa boundary test key, 32 bytes";
    let message: Vec<u8> = (0..message_len).map(|i| (i % 256) as u8).collect();
    let mut mac = Kpa::kpa256(key, b"boundary");
    mac.update(&message);
    let mut out = vec![0u8; 32];
    mac.finalize(&mut out);
    out
}

#[test]
fn exact_multiple_of_eight_leaf_blocks_is_deterministic() {
    let len = 8 * RATE_256;
    let a = tag_for(len);
    let b = tag_for(len);
    assert_eq!(a, b);
}

#[test]
fn one_byte_past_a_full_round_differs_from_the_exact_boundary() {
    let exact = tag_for(8 * RATE_256);
    let one_more = tag_for(8 * RATE_256 + 1);
    assert_ne!(exact, one_more);
}

#[test]
fn empty_message_is_a_valid_input() {
    let key = b"kpa boundary test key, 32 bytes";
    let mut mac = Kpa::kpa256(key, b"");
    let mut out = [0u8; 32];
    mac.finalize(&mut out);
    assert_ne!(out, [0u8; 32]);
}

#[test]
fn kpa512_and_kpa256_diverge_on_the_same_key_and_message() {
    let key = b"kpa boundary test key, 32 bytes";
    let message = b"same input, different rate";

    let mut mac256 = Kpa::kpa256(key, b"");
    mac256.update(message);
    let mut out256 = [0u8; 32];
    mac256.finalize(&mut out256);

    let mut mac512 = Kpa::kpa512(key, b"");
    mac512.update(message);
    let mut out512 = [0u8; 32];
    mac512.finalize(&mut out512);

    assert_ne!(&out256[..], &out512[..]);
}
