//! The AES-NI backend: `aesenc`/`aesenclast` run directly on the wide
//! block, paired up in 128-bit lanes with the blend/shuffle dance
//! `rcs_transform_256` uses to diffuse state between the two 128-bit
//! halves of the 256-bit block before each round's `aesenc`. Both RCS-256
//! and RCS-512 share this same 32-byte block (RCS-512 only widens the key
//! schedule and round count), so there is exactly one half-block pair to
//! process per block, matching the table-based backend in `tables.rs`
//! bit-for-bit.

use core::arch::x86_64::*;

#[target_feature(enable = "aes", enable = "sse2", enable = "ssse3")]
unsafe fn blend_shuffle(blk1: __m128i, blk2: __m128i) -> (__m128i, __m128i) {
    let blend_mask = _mm_set_epi32(0x8000_0000u32 as i32, 0x8080_0000u32 as i32, 0x8080_0000u32 as i32, 0x8080_8000u32 as i32);
    let shift_mask = _mm_setr_epi8(0, 1, 6, 7, 4, 5, 10, 11, 8, 9, 14, 15, 12, 13, 2, 3);

    let tmp1 = _mm_blendv_epi8(blk1, blk2, blend_mask);
    let tmp2 = _mm_blendv_epi8(blk2, blk1, blend_mask);
    (_mm_shuffle_epi8(tmp1, shift_mask), _mm_shuffle_epi8(tmp2, shift_mask))
}

/// Runs the blend/shuffle/`aesenc` dance over one 256-bit (two-lane) half
/// block, exactly mirroring `rcs_transform_256`'s AES-NI path: whitening,
/// `rounds - 1` mixing rounds, then a final `aesenclast` round.
#[target_feature(enable = "aes", enable = "sse2", enable = "ssse3")]
unsafe fn encrypt_half(input0: __m128i, input1: __m128i, round_keys: &[__m128i], rounds: u32) -> (__m128i, __m128i) {
    let mut blk1 = _mm_xor_si128(input0, round_keys[0]);
    let mut blk2 = _mm_xor_si128(input1, round_keys[1]);
    let mut kctr = 1usize;
    let round_count = rounds as usize - 1;

    for _ in 0..round_count {
        let (tmp1, tmp2) = blend_shuffle(blk1, blk2);
        kctr += 1;
        blk1 = _mm_aesenc_si128(tmp1, round_keys[kctr]);
        kctr += 1;
        blk2 = _mm_aesenc_si128(tmp2, round_keys[kctr]);
    }

    let (tmp1, tmp2) = blend_shuffle(blk1, blk2);
    kctr += 1;
    blk1 = _mm_aesenclast_si128(tmp1, round_keys[kctr]);
    kctr += 1;
    blk2 = _mm_aesenclast_si128(tmp2, round_keys[kctr]);

    (blk1, blk2)
}

/// Encrypts one `columns * 4`-byte block (`columns` is always 8 — a
/// 32-byte, two-lane block — for both RCS-256 and RCS-512). `round_keys`
/// is the same flat byte schedule the table-based backend uses; it's
/// reinterpreted here as `__m128i` lanes, 2 lanes per round.
///
/// # Safety
/// Caller must have verified `is_x86_feature_detected!("aes")` and
/// `("sse2")` before calling (see [`super::Backend::detect`]).
pub(super) unsafe fn encrypt_block(input: &[u8], round_keys: &[u8], rounds: u32, columns: usize) -> Vec<u8> {
    let block_size = columns * 4;
    debug_assert_eq!(block_size, 32);

    let in0 = _mm_loadu_si128(input.as_ptr() as *const __m128i);
    let in1 = _mm_loadu_si128(input[16..].as_ptr() as *const __m128i);

    let mut round_key_lanes: Vec<__m128i> = Vec::with_capacity(2 * (rounds as usize + 1));
    for round in 0..=rounds as usize {
        let offset = round * block_size;
        round_key_lanes.push(_mm_loadu_si128(round_keys[offset..].as_ptr() as *const __m128i));
        round_key_lanes.push(_mm_loadu_si128(round_keys[offset + 16..].as_ptr() as *const __m128i));
    }

    let (out0, out1) = encrypt_half(in0, in1, &round_key_lanes, rounds);
    let mut output = vec![0u8; block_size];
    _mm_storeu_si128(output.as_mut_ptr() as *mut __m128i, out0);
    _mm_storeu_si128(output[16..].as_mut_ptr() as *mut __m128i, out1);

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_is_deterministic_when_available() {
        if !(is_x86_feature_detected!("aes") && is_x86_feature_detected!("sse2")) {
            return;
        }
        let round_keys = vec![0x5Au8; (22 + 1) * 32];
        let input = [0x42u8; 32];
        let a = unsafe { encrypt_block(&input, &round_keys, 22, 8) };
        let b = unsafe { encrypt_block(&input, &round_keys, 22, 8) };
        assert_eq!(a, b);
        assert_ne!(a, vec![0u8; 32]);
    }

    #[test]
    fn rcs512_round_count_encrypts_the_same_32_byte_block_when_available() {
        if !(is_x86_feature_detected!("aes") && is_x86_feature_detected!("sse2")) {
            return;
        }
        let round_keys = vec![0x22u8; (30 + 1) * 32];
        let input = [0x33u8; 32];
        let out = unsafe { encrypt_block(&input, &round_keys, 30, 8) };
        assert_eq!(out.len(), 32);
    }

    /// The AES-NI and table backends implement the same abstract
    /// `encrypt_block_32` operation (`SPEC_FULL.md`'s C6 design notes): a
    /// ciphertext sealed on a machine with AES-NI must `open` correctly on
    /// one without it. They must therefore agree byte-for-byte given the
    /// same round-key schedule, for every round count RCS uses.
    #[test]
    fn agrees_with_table_backend_when_available() {
        if !(is_x86_feature_detected!("aes") && is_x86_feature_detected!("sse2")) {
            return;
        }
        for rounds in [22u32, 30u32] {
            let round_keys: Vec<u8> = (0..(rounds as usize + 1) * 32).map(|i| i as u8).collect();
            let input: [u8; 32] = core::array::from_fn(|i| (i * 7) as u8);

            let aesni_out = unsafe { encrypt_block(&input, &round_keys, rounds, 8) };
            let table_out = super::tables::encrypt_block(&input, &round_keys, rounds, 8);

            assert_eq!(aesni_out, table_out, "backends diverged at {rounds} rounds");
        }
    }
}
