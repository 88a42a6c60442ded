//! The Keccak-f\[1600\] permutation core (C2) and its sponge primitives.
//!
//! This module owns the 25-lane state, the scalar and batched permutations,
//! the rate-aware absorb/squeeze primitives, and the SP 800-185
//! `left_encode`/`right_encode` integer framings. `sponge.rs`, `kpa.rs` and
//! `parallel.rs` are all built on top of the functions exposed here.

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
pub(crate) mod simd;

use zeroize::Zeroize;

/// Number of 64-bit lanes in the Keccak-f\[1600\] state.
pub(crate) const LANES: usize = 25;
/// Full round count of the unreduced permutation.
pub const MAX_ROUNDS: u32 = 24;
/// The reduced round count used by KPA (C4) and the optional CSX KMAC-R12
/// MAC variant. Resolved from the `QSC_KECCAK_PERMUTATION_MIN_ROUNDS`
/// constant in the original source (see `DESIGN.md`).
pub const MIN_ROUNDS: u32 = 12;

/// The sponge rate, in bytes, for each construction. Named per the
/// REDESIGN FLAGS item in `spec.md` §9 ("domain byte as magic integer" —
/// applied here to rates as well).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rate {
    /// 168 bytes: SHAKE-128, KPA-128.
    R128 = 168,
    /// 136 bytes: SHA3-256, SHAKE-256, KMAC-256, KPA-256.
    R256 = 136,
    /// 104 bytes: SHA3-384.
    R384 = 104,
    /// 72 bytes: SHA3-512, KMAC-512, KPA-512.
    R512 = 72,
}

impl Rate {
    /// The rate in bytes.
    #[inline(always)]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

/// The trailing domain-separation byte absorbed before the final padding
/// bit, one per sponge construction (`spec.md` §3 "Domain constants").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainId {
    Sha3 = 0x06,
    Shake = 0x1F,
    CShake = 0x04,
    Kmac = 0x04,
    Kpa = 0x41,
}

impl DomainId {
    #[inline(always)]
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

pub(crate) const RC: [u64; MAX_ROUNDS as usize] = [
    0x0000000000000001,
    0x0000000000008082,
    0x800000000000808a,
    0x8000000080008000,
    0x000000000000808b,
    0x0000000080000001,
    0x8000000080008081,
    0x8000000000008009,
    0x000000000000008a,
    0x0000000000000088,
    0x0000000080008009,
    0x000000008000000a,
    0x000000008000808b,
    0x800000000000008b,
    0x8000000000008089,
    0x8000000000008003,
    0x8000000000008002,
    0x8000000000000080,
    0x000000000000800a,
    0x800000008000000a,
    0x8000000080008081,
    0x8000000000008080,
    0x0000000080000001,
    0x8000000080008008,
];

// (0..24).map(|t| ((t + 1) * (t + 2) / 2) % 64)
pub(crate) const RHO: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];
pub(crate) const PI: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// The scalar Keccak-f\[1600, `rounds`\] permutation, applying the last
/// `rounds` of the 24 standardized rounds (so `rounds == 24` is the
/// unreduced permutation, and smaller even values give the reduced-round
/// variants used by KPA and CSX's KMAC-R12 mode).
pub fn permute(lanes: &mut [u64; LANES], rounds: u32) {
    debug_assert!(rounds % 2 == 0 && rounds <= MAX_ROUNDS);

    let mut c = [0u64; 5];
    let start = (MAX_ROUNDS - rounds) as usize;

    for round in start..MAX_ROUNDS as usize {
        // theta
        for x in 0..5 {
            c[x] = lanes[x] ^ lanes[x + 5] ^ lanes[x + 10] ^ lanes[x + 15] ^ lanes[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in (0..25).step_by(5) {
                lanes[x + y] ^= d;
            }
        }

        // rho and pi
        let mut a = lanes[1];
        for i in 0..24 {
            let tmp = lanes[PI[i]];
            lanes[PI[i]] = a.rotate_left(RHO[i]);
            a = tmp;
        }

        // chi
        for y in (0..25).step_by(5) {
            for x in 0..5 {
                c[x] = lanes[x + y];
            }
            for x in 0..5 {
                lanes[x + y] = c[x] ^ ((!c[(x + 1) % 5]) & c[(x + 2) % 5]);
            }
        }

        // iota
        lanes[0] ^= RC[round];
    }
}

/// A Keccak-f\[1600\] sponge state: 25 64-bit lanes plus the incremental
/// absorb buffer and position used by the sponge constructions in
/// `sponge.rs`.
#[derive(Clone, Zeroize)]
pub struct KeccakState {
    pub(crate) lanes: [u64; LANES],
    #[zeroize(skip)]
    pub(crate) buffer: [u8; LANES * 8],
    pub(crate) position: usize,
    #[zeroize(skip)]
    pub(crate) squeezing: bool,
}

impl Default for KeccakState {
    fn default() -> Self {
        KeccakState {
            lanes: [0u64; LANES],
            buffer: [0u8; LANES * 8],
            position: 0,
            squeezing: false,
        }
    }
}

impl KeccakState {
    /// Returns the state's lanes as a little-endian byte view.
    pub(crate) fn bytes(&self) -> [u8; LANES * 8] {
        let mut out = [0u8; LANES * 8];
        for (chunk, lane) in out.chunks_mut(8).zip(self.lanes.iter()) {
            chunk.copy_from_slice(&lane.to_le_bytes());
        }
        out
    }

    /// Permutes the state in place, running `rounds` rounds.
    pub(crate) fn permute(&mut self, rounds: u32) {
        permute(&mut self.lanes, rounds);
    }

    /// Absorbs an arbitrary-length message incrementally, buffering any
    /// partial trailing block between calls. Must not be called again
    /// after [`KeccakState::squeeze`] has started producing output.
    pub(crate) fn update(&mut self, rate: Rate, mut input: &[u8]) {
        debug_assert!(!self.squeezing);
        let rate_len = rate.bytes();

        if self.position > 0 {
            let take = core::cmp::min(rate_len - self.position, input.len());
            self.buffer[self.position..self.position + take].copy_from_slice(&input[..take]);
            self.position += take;
            input = &input[take..];
            if self.position == rate_len {
                fast_absorb(&mut self.lanes, &self.buffer[..rate_len]);
                permute(&mut self.lanes, MAX_ROUNDS);
                self.position = 0;
            }
        }

        while input.len() >= rate_len {
            fast_absorb(&mut self.lanes, &input[..rate_len]);
            permute(&mut self.lanes, MAX_ROUNDS);
            input = &input[rate_len..];
        }

        if !input.is_empty() {
            self.buffer[..input.len()].copy_from_slice(input);
            self.position = input.len();
        }
    }

    /// Pads and finalizes the absorb phase on first call, then streams
    /// `output.len()` bytes of squeezed output. Safe to call repeatedly to
    /// extend the output of an extendable-output function.
    pub(crate) fn squeeze(&mut self, rate: Rate, domain: DomainId, output: &mut [u8]) {
        let rate_len = rate.bytes();

        if !self.squeezing {
            let mut block = [0u8; LANES * 8];
            block[..self.position].copy_from_slice(&self.buffer[..self.position]);
            block[self.position] = domain.byte();
            block[rate_len - 1] |= 0x80;
            fast_absorb(&mut self.lanes, &block[..rate_len]);
            self.squeezing = true;
            self.position = rate_len;
        }

        let mut offset = 0;
        while offset < output.len() {
            if self.position == rate_len {
                permute(&mut self.lanes, MAX_ROUNDS);
                self.buffer = self.bytes();
                self.position = 0;
            }
            let take = core::cmp::min(rate_len - self.position, output.len() - offset);
            output[offset..offset + take]
                .copy_from_slice(&self.buffer[self.position..self.position + take]);
            self.position += take;
            offset += take;
        }
    }
}

/// XORs a little-endian byte block into the state's low bytes, without
/// permuting. `block.len()` must not exceed the state's 200-byte width.
pub(crate) fn fast_absorb(lanes: &mut [u64; LANES], block: &[u8]) {
    debug_assert!(block.len() <= LANES * 8);
    for (i, chunk) in block.chunks(8).enumerate() {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        lanes[i] ^= u64::from_le_bytes(word);
    }
}

/// Absorbs `input` into `lanes` at the given `rate`, permuting between
/// every full block, then pads the trailing partial block with the domain
/// separator byte and the final high bit but does **not** permute it — the
/// pending block is left for the next `squeezeblocks`/`fast_absorb` call to
/// fold in, matching the reference `keccak_absorb` (see `DESIGN.md`).
pub fn absorb(lanes: &mut [u64; LANES], rate: Rate, mut input: &[u8], domain: DomainId) {
    let rate = rate.bytes();

    while input.len() >= rate {
        fast_absorb(lanes, &input[..rate]);
        permute(lanes, MAX_ROUNDS);
        input = &input[rate..];
    }

    let mut block = [0u8; LANES * 8];
    block[..input.len()].copy_from_slice(input);
    block[input.len()] = domain.byte();
    block[rate - 1] |= 0x80;
    fast_absorb(lanes, &block[..rate]);
}

/// Permutes `lanes` then copies `nblocks * rate` bytes out into `output`.
pub fn squeezeblocks(lanes: &mut [u64; LANES], output: &mut [u8], nblocks: usize, rate: Rate) {
    let rate = rate.bytes();
    debug_assert!(output.len() >= nblocks * rate);

    for block in output.chunks_mut(rate).take(nblocks) {
        permute(lanes, MAX_ROUNDS);
        let bytes = {
            let mut out = [0u8; LANES * 8];
            for (chunk, lane) in out.chunks_mut(8).zip(lanes.iter()) {
                chunk.copy_from_slice(&lane.to_le_bytes());
            }
            out
        };
        block.copy_from_slice(&bytes[..rate]);
    }
}

/// SP 800-185 `left_encode`: writes the minimal big-endian byte encoding of
/// `value`, prefixed with its own length, and returns the number of bytes
/// written.
pub fn left_encode(buf: &mut [u8], value: u64) -> usize {
    let mut n = 0usize;
    let mut v = value;
    while v != 0 && n < 8 {
        n += 1;
        v >>= 8;
    }
    if n == 0 {
        n = 1;
    }
    for i in 1..=n {
        buf[i] = (value >> (8 * (n - i))) as u8;
    }
    buf[0] = n as u8;
    n + 1
}

/// SP 800-185 `right_encode`: writes the minimal big-endian byte encoding
/// of `value`, suffixed with its own length, and returns the number of
/// bytes written.
pub fn right_encode(buf: &mut [u8], value: u64) -> usize {
    let mut n = 0usize;
    let mut v = value;
    while v != 0 && n < 8 {
        n += 1;
        v >>= 8;
    }
    if n == 0 {
        n = 1;
    }
    for i in 1..=n {
        buf[i - 1] = (value >> (8 * (n - i))) as u8;
    }
    buf[n] = n as u8;
    n + 1
}
