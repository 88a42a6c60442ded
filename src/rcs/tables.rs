//! The table-based scalar Rijndael transform, used when AES-NI isn't
//! available (or the `aesni` feature is off). Ported byte-for-byte from
//! `rcs_s_box`/`rcs_rcon`/`rcs_add_roundkey`/`rcs_mix_columns` in the
//! reference implementation. Both RCS-256 and RCS-512 share the same
//! 32-byte (8-column) block, so `columns` below is always 8; it's kept as
//! an explicit parameter rather than a hardcoded constant only because
//! `encrypt_block`'s signature is shared with the AES-NI backend.

const S_BOX: [u8; 256] = [
    0x63, 0x7C, 0x77, 0x7B, 0xF2, 0x6B, 0x6F, 0xC5, 0x30, 0x01, 0x67, 0x2B, 0xFE, 0xD7, 0xAB, 0x76,
    0xCA, 0x82, 0xC9, 0x7D, 0xFA, 0x59, 0x47, 0xF0, 0xAD, 0xD4, 0xA2, 0xAF, 0x9C, 0xA4, 0x72, 0xC0,
    0xB7, 0xFD, 0x93, 0x26, 0x36, 0x3F, 0xF7, 0xCC, 0x34, 0xA5, 0xE5, 0xF1, 0x71, 0xD8, 0x31, 0x15,
    0x04, 0xC7, 0x23, 0xC3, 0x18, 0x96, 0x05, 0x9A, 0x07, 0x12, 0x80, 0xE2, 0xEB, 0x27, 0xB2, 0x75,
    0x09, 0x83, 0x2C, 0x1A, 0x1B, 0x6E, 0x5A, 0xA0, 0x52, 0x3B, 0xD6, 0xB3, 0x29, 0xE3, 0x2F, 0x84,
    0x53, 0xD1, 0x00, 0xED, 0x20, 0xFC, 0xB1, 0x5B, 0x6A, 0xCB, 0xBE, 0x39, 0x4A, 0x4C, 0x58, 0xCF,
    0xD0, 0xEF, 0xAA, 0xFB, 0x43, 0x4D, 0x33, 0x85, 0x45, 0xF9, 0x02, 0x7F, 0x50, 0x3C, 0x9F, 0xA8,
    0x51, 0xA3, 0x40, 0x8F, 0x92, 0x9D, 0x38, 0xF5, 0xBC, 0xB6, 0xDA, 0x21, 0x10, 0xFF, 0xF3, 0xD2,
    0xCD, 0x0C, 0x13, 0xEC, 0x5F, 0x97, 0x44, 0x17, 0xC4, 0xA7, 0x7E, 0x3D, 0x64, 0x5D, 0x19, 0x73,
    0x60, 0x81, 0x4F, 0xDC, 0x22, 0x2A, 0x90, 0x88, 0x46, 0xEE, 0xB8, 0x14, 0xDE, 0x5E, 0x0B, 0xDB,
    0xE0, 0x32, 0x3A, 0x0A, 0x49, 0x06, 0x24, 0x5C, 0xC2, 0xD3, 0xAC, 0x62, 0x91, 0x95, 0xE4, 0x79,
    0xE7, 0xC8, 0x37, 0x6D, 0x8D, 0xD5, 0x4E, 0xA9, 0x6C, 0x56, 0xF4, 0xEA, 0x65, 0x7A, 0xAE, 0x08,
    0xBA, 0x78, 0x25, 0x2E, 0x1C, 0xA6, 0xB4, 0xC6, 0xE8, 0xDD, 0x74, 0x1F, 0x4B, 0xBD, 0x8B, 0x8A,
    0x70, 0x3E, 0xB5, 0x66, 0x48, 0x03, 0xF6, 0x0E, 0x61, 0x35, 0x57, 0xB9, 0x86, 0xC1, 0x1D, 0x9E,
    0xE1, 0xF8, 0x98, 0x11, 0x69, 0xD9, 0x8E, 0x94, 0x9B, 0x1E, 0x87, 0xE9, 0xCE, 0x55, 0x28, 0xDF,
    0x8C, 0xA1, 0x89, 0x0D, 0xBF, 0xE6, 0x42, 0x68, 0x41, 0x99, 0x2D, 0x0F, 0xB0, 0x54, 0xBB, 0x16,
];

/// Row rotation amounts (in columns) for the widened `ShiftRows`: row 0 is
/// untouched, rows 1–3 rotate left by 1/3/4 columns, matching the
/// reference's fixed 8-column table (`rcs_shift_rows`).
const ROW_SHIFT: [usize; 4] = [0, 1, 3, 4];

fn sub_bytes(state: &mut [u8]) {
    for byte in state.iter_mut() {
        *byte = S_BOX[*byte as usize];
    }
}

fn shift_rows(state: &mut [u8], columns: usize) {
    for (row, &shift) in ROW_SHIFT.iter().enumerate().skip(1) {
        let mut tmp = [0u8; 8];
        for (col, slot) in tmp.iter_mut().enumerate().take(columns) {
            *slot = state[row + 4 * col];
        }
        tmp[..columns].rotate_left(shift);
        for col in 0..columns {
            state[row + 4 * col] = tmp[col];
        }
    }
}

fn add_roundkey(state: &mut [u8], round_key: &[u8]) {
    for (byte, key_byte) in state.iter_mut().zip(round_key) {
        *byte ^= key_byte;
    }
}

fn gf256_double_reduce(t: u32) -> u8 {
    let hi = t >> 8;
    (t ^ ((!hi).wrapping_add(1) & 0x0000_011B)) as u8
}

fn mix_columns(state: &mut [u8]) {
    for word in state.chunks_mut(4) {
        let s0 = word[0] as u32;
        let s1 = word[1] as u32;
        let s2 = word[2] as u32;
        let s3 = word[3] as u32;

        let t0 = (s0 << 1) ^ s1 ^ (s1 << 1) ^ s2 ^ s3;
        let t1 = s0 ^ (s1 << 1) ^ s2 ^ (s2 << 1) ^ s3;
        let t2 = s0 ^ s1 ^ (s2 << 1) ^ s3 ^ (s3 << 1);
        let t3 = s0 ^ (s0 << 1) ^ s1 ^ s2 ^ (s3 << 1);

        word[0] = gf256_double_reduce(t0);
        word[1] = gf256_double_reduce(t1);
        word[2] = gf256_double_reduce(t2);
        word[3] = gf256_double_reduce(t3);
    }
}

/// Encrypts one `columns * 4`-byte block under the flat round-key schedule
/// (`(rounds + 1)` keys of `columns * 4` bytes each, back to back), exactly
/// mirroring `rcs_transform_256`'s round structure: an initial whitening
/// `AddRoundKey`, `rounds - 1` full mixing rounds, and a final round with
/// `MixColumns` omitted.
pub(super) fn encrypt_block(input: &[u8], round_keys: &[u8], rounds: u32, columns: usize) -> Vec<u8> {
    let block_size = columns * 4;
    let mut buf = input[..block_size].to_vec();

    add_roundkey(&mut buf, &round_keys[..block_size]);

    for round in 1..rounds {
        sub_bytes(&mut buf);
        shift_rows(&mut buf, columns);
        mix_columns(&mut buf);
        let offset = round as usize * block_size;
        add_roundkey(&mut buf, &round_keys[offset..offset + block_size]);
    }

    sub_bytes(&mut buf);
    shift_rows(&mut buf, columns);
    let offset = rounds as usize * block_size;
    add_roundkey(&mut buf, &round_keys[offset..offset + block_size]);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_is_deterministic_and_nonzero() {
        let round_keys = vec![0x5Au8; (22 + 1) * 32];
        let input = [0u8; 32];
        let a = encrypt_block(&input, &round_keys, 22, 8);
        let b = encrypt_block(&input, &round_keys, 22, 8);
        assert_eq!(a, b);
        assert_ne!(a, vec![0u8; 32]);
    }

    #[test]
    fn different_inputs_diverge() {
        let round_keys = vec![0x11u8; (22 + 1) * 32];
        let a = encrypt_block(&[0u8; 32], &round_keys, 22, 8);
        let b = encrypt_block(&[1u8; 32], &round_keys, 22, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn rcs512_round_count_encrypts_the_same_32_byte_block() {
        // RCS-512 only widens the key schedule and round count; the block
        // itself stays 8 columns / 32 bytes, same as RCS-256.
        let round_keys = vec![0x22u8; (30 + 1) * 32];
        let input = [0x33u8; 32];
        let out = encrypt_block(&input, &round_keys, 30, 8);
        assert_eq!(out.len(), 32);
        assert_ne!(out, vec![0u8; 32]);
    }
}
