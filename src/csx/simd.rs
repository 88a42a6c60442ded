//! Batched CSX permutation: 4 independent 1024-bit states packed into AVX2
//! lanes, or 8 into AVX-512 lanes, used by [`super::Csx::ctr_transform`] to
//! generate several keystream blocks (successive counter values) per
//! vectorized pass.
//!
//! Unlike Keccak's rho/pi steps, every round of the CSX permutation reads
//! and writes a fixed set of lane indices with no cross-lane data movement,
//! so batching is a pure "structure of arrays" widening: one vector
//! register per lane position, one vector lane per packed counter block.
//! [`permute4_portable`] and [`permute8_portable`] give a pure-Rust
//! reference that also serves as the fallback when the running CPU lacks
//! the matching instruction set extension.

use core::arch::x86_64::*;

use super::{GROUP_A, GROUP_B, LANES, ROTATIONS, ROUNDS};

/// A batch of 4 independent 16-lane CSX states, laid out as 16 vectors of
/// 4 lanes each (one lane per packed counter block).
pub(crate) type Batch4 = [[u64; 4]; LANES];
/// A batch of 8 independent 16-lane CSX states, laid out as 16 vectors of
/// 8 lanes each.
pub(crate) type Batch8 = [[u64; 8]; LANES];

/// Which vectorized backend a keystream batch was constructed to use,
/// decided once via runtime feature detection at cipher construction and
/// never re-read mid-transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Backend {
    Portable,
    Avx2,
    Avx512,
}

impl Backend {
    /// Picks the best backend for 4-way batching available on this CPU.
    pub(crate) fn detect4() -> Backend {
        if is_x86_feature_detected!("avx2") {
            Backend::Avx2
        } else {
            Backend::Portable
        }
    }

    /// Picks the best backend for 8-way batching available on this CPU.
    pub(crate) fn detect8() -> Backend {
        if is_x86_feature_detected!("avx512f") {
            Backend::Avx512
        } else if is_x86_feature_detected!("avx2") {
            Backend::Avx2
        } else {
            Backend::Portable
        }
    }
}

fn run_rounds(state: &mut [u64; LANES]) {
    for round in 0..ROUNDS {
        let groups = if round % 2 == 0 { &GROUP_A } else { &GROUP_B };
        let rot_base = (round % 2) * 4;
        for (group_idx, cols) in groups.iter().enumerate() {
            let rot = ROTATIONS[rot_base + group_idx];
            super::quarter_round(state, *cols, rot);
        }
    }
}

/// Runs the 40-round permutation independently over each of the 4 packed
/// lanes, by transposing to 4 scalar states. Always correct; serves as the
/// reference oracle for the vectorized backends and as the fallback when
/// AVX2 is unavailable.
pub(crate) fn permute4_portable(batch: &mut Batch4) {
    for slot in 0..4 {
        let mut state: [u64; LANES] = core::array::from_fn(|word| batch[word][slot]);
        run_rounds(&mut state);
        for word in 0..LANES {
            batch[word][slot] = state[word];
        }
    }
}

/// Runs the 40-round permutation independently over each of the 8 packed
/// lanes. See [`permute4_portable`].
pub(crate) fn permute8_portable(batch: &mut Batch8) {
    for slot in 0..8 {
        let mut state: [u64; LANES] = core::array::from_fn(|word| batch[word][slot]);
        run_rounds(&mut state);
        for word in 0..LANES {
            batch[word][slot] = state[word];
        }
    }
}

/// Dispatches to the best available 4-way backend, selected once by the
/// caller via [`Backend::detect4`].
pub(crate) fn permute4(backend: Backend, batch: &mut Batch4) {
    match backend {
        Backend::Portable | Backend::Avx512 => permute4_portable(batch),
        Backend::Avx2 => unsafe { permute4_avx2(batch) },
    }
}

/// Dispatches to the best available 8-way backend, selected once by the
/// caller via [`Backend::detect8`].
pub(crate) fn permute8(backend: Backend, batch: &mut Batch8) {
    match backend {
        Backend::Portable => permute8_portable(batch),
        Backend::Avx2 => {
            // Fold two independent AVX2 4-lane passes over the low and
            // high halves of the 8-way batch.
            let mut lo: Batch4 = Default::default();
            let mut hi: Batch4 = Default::default();
            for word in 0..LANES {
                lo[word] = [batch[word][0], batch[word][1], batch[word][2], batch[word][3]];
                hi[word] = [batch[word][4], batch[word][5], batch[word][6], batch[word][7]];
            }
            unsafe {
                permute4_avx2(&mut lo);
                permute4_avx2(&mut hi);
            }
            for word in 0..LANES {
                batch[word] = [
                    lo[word][0], lo[word][1], lo[word][2], lo[word][3], hi[word][0], hi[word][1],
                    hi[word][2], hi[word][3],
                ];
            }
        }
        Backend::Avx512 => unsafe { permute8_avx512(batch) },
    }
}

#[target_feature(enable = "avx2")]
unsafe fn rotl256(x: __m256i, n: u32) -> __m256i {
    let left = _mm256_sllv_epi64(x, _mm256_set1_epi64x(n as i64));
    let right = _mm256_srlv_epi64(x, _mm256_set1_epi64x((64 - n) as i64));
    _mm256_or_si256(left, right)
}

#[target_feature(enable = "avx2")]
unsafe fn quarter_round_avx2(state: &mut [__m256i; LANES], lanes: [usize; 4], rot: [u32; 4]) {
    let (x, y, z, w) = (lanes[0], lanes[1], lanes[2], lanes[3]);
    state[x] = _mm256_add_epi64(state[x], state[y]);
    state[w] = rotl256(_mm256_xor_si256(state[w], state[x]), rot[0]);
    state[z] = _mm256_add_epi64(state[z], state[w]);
    state[y] = rotl256(_mm256_xor_si256(state[y], state[z]), rot[1]);
    state[x] = _mm256_add_epi64(state[x], state[y]);
    state[w] = rotl256(_mm256_xor_si256(state[w], state[x]), rot[2]);
    state[z] = _mm256_add_epi64(state[z], state[w]);
    state[y] = rotl256(_mm256_xor_si256(state[y], state[z]), rot[3]);
}

#[target_feature(enable = "avx2")]
unsafe fn permute4_avx2(batch: &mut Batch4) {
    let mut lanes: [__m256i; LANES] =
        core::array::from_fn(|i| _mm256_loadu_si256(batch[i].as_ptr() as *const __m256i));

    for round in 0..ROUNDS {
        let groups = if round % 2 == 0 { &GROUP_A } else { &GROUP_B };
        let rot_base = (round % 2) * 4;
        for (group_idx, cols) in groups.iter().enumerate() {
            let rot = ROTATIONS[rot_base + group_idx];
            quarter_round_avx2(&mut lanes, *cols, rot);
        }
    }

    for (i, lane) in lanes.iter().enumerate() {
        _mm256_storeu_si256(batch[i].as_mut_ptr() as *mut __m256i, *lane);
    }
}

#[target_feature(enable = "avx512f")]
unsafe fn rotl512(x: __m512i, n: u32) -> __m512i {
    let left = _mm512_sllv_epi64(x, _mm512_set1_epi64(n as i64));
    let right = _mm512_srlv_epi64(x, _mm512_set1_epi64((64 - n) as i64));
    _mm512_or_si512(left, right)
}

#[target_feature(enable = "avx512f")]
unsafe fn quarter_round_avx512(state: &mut [__m512i; LANES], lanes: [usize; 4], rot: [u32; 4]) {
    let (x, y, z, w) = (lanes[0], lanes[1], lanes[2], lanes[3]);
    state[x] = _mm512_add_epi64(state[x], state[y]);
    state[w] = rotl512(_mm512_xor_si512(state[w], state[x]), rot[0]);
    state[z] = _mm512_add_epi64(state[z], state[w]);
    state[y] = rotl512(_mm512_xor_si512(state[y], state[z]), rot[1]);
    state[x] = _mm512_add_epi64(state[x], state[y]);
    state[w] = rotl512(_mm512_xor_si512(state[w], state[x]), rot[2]);
    state[z] = _mm512_add_epi64(state[z], state[w]);
    state[y] = rotl512(_mm512_xor_si512(state[y], state[z]), rot[3]);
}

#[target_feature(enable = "avx512f")]
unsafe fn permute8_avx512(batch: &mut Batch8) {
    let mut lanes: [__m512i; LANES] =
        core::array::from_fn(|i| _mm512_loadu_si512(batch[i].as_ptr() as *const _));

    for round in 0..ROUNDS {
        let groups = if round % 2 == 0 { &GROUP_A } else { &GROUP_B };
        let rot_base = (round % 2) * 4;
        for (group_idx, cols) in groups.iter().enumerate() {
            let rot = ROTATIONS[rot_base + group_idx];
            quarter_round_avx512(&mut lanes, *cols, rot);
        }
    }

    for (i, lane) in lanes.iter().enumerate() {
        _mm512_storeu_si512(batch[i].as_mut_ptr() as *mut _, *lane);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portable_batch_matches_scalar() {
        let mut batch: Batch4 = Default::default();
        for (word, slot) in batch.iter_mut().enumerate() {
            *slot = [word as u64, word as u64 + 1, word as u64 + 2, word as u64 + 3];
        }
        let mut scalar = [0u64; LANES];
        for word in 0..LANES {
            scalar[word] = batch[word][0];
        }
        permute4_portable(&mut batch);
        run_rounds(&mut scalar);
        for word in 0..LANES {
            assert_eq!(batch[word][0], scalar[word]);
        }
    }

    #[test]
    fn avx2_matches_portable_when_available() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let mut portable: Batch4 = Default::default();
        for (word, slot) in portable.iter_mut().enumerate() {
            *slot = [word as u64, word as u64 + 1, word as u64 + 2, word as u64 + 3];
        }
        let mut vectorized = portable;
        permute4_portable(&mut portable);
        unsafe { permute4_avx2(&mut vectorized) };
        assert_eq!(portable, vectorized);
    }

    #[test]
    fn avx512_matches_portable_when_available() {
        if !is_x86_feature_detected!("avx512f") {
            return;
        }
        let mut portable: Batch8 = Default::default();
        for (word, slot) in portable.iter_mut().enumerate() {
            *slot = core::array::from_fn(|lane| (word + lane) as u64);
        }
        let mut vectorized = portable;
        permute8_portable(&mut portable);
        unsafe { permute8_avx512(&mut vectorized) };
        assert_eq!(portable, vectorized);
    }

    #[test]
    fn backend_dispatch_matches_portable_for_4_and_8_way() {
        let mut reference4: Batch4 = Default::default();
        for (word, slot) in reference4.iter_mut().enumerate() {
            *slot = [word as u64, word as u64 + 7, word as u64 + 11, word as u64 + 13];
        }
        let mut dispatched4 = reference4;
        permute4_portable(&mut reference4);
        permute4(Backend::detect4(), &mut dispatched4);
        assert_eq!(reference4, dispatched4);

        let mut reference8: Batch8 = Default::default();
        for (word, slot) in reference8.iter_mut().enumerate() {
            *slot = core::array::from_fn(|lane| (word * 3 + lane) as u64);
        }
        let mut dispatched8 = reference8;
        permute8_portable(&mut reference8);
        permute8(Backend::detect8(), &mut dispatched8);
        assert_eq!(reference8, dispatched8);
    }
}
