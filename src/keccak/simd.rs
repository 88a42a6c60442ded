//! Batched Keccak-f\[1600\] permutations: 4 independent states packed into
//! AVX2 lanes, or 8 into AVX-512 lanes, used by the parallel sponge
//! constructions in `parallel.rs` and KPA's 8-leaf tree in `kpa.rs`.
//!
//! Each backend operates on a "structure of arrays" layout: 25 vector
//! registers, one per lane position, each holding the same lane from every
//! packed state. [`permute4_portable`] and [`permute8_portable`] give a
//! pure-Rust reference that also serves as the fallback when the running
//! CPU lacks the matching instruction set extension, mirroring the
//! dual-path `kpa_load_state`/vectorized split in the original source (see
//! `DESIGN.md`).

use core::arch::x86_64::*;

use super::{permute, MAX_ROUNDS, PI, RC, RHO};

/// A batch of 4 independent 25-lane Keccak states, laid out as 25 vectors
/// of 4 lanes each (one lane per packed state).
pub(crate) type Batch4 = [[u64; 4]; 25];
/// A batch of 8 independent 25-lane Keccak states, laid out as 25 vectors
/// of 8 lanes each.
pub(crate) type Batch8 = [[u64; 8]; 25];

/// Which vectorized backend a [`crate::parallel::Lanes4`]/`Lanes8` batch
/// was constructed to use, decided once via runtime feature detection and
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

/// Runs `rounds` rounds of Keccak-f\[1600\] independently over each of the
/// 4 packed lanes, by transposing to 4 scalar states. Always correct;
/// serves as the reference oracle for the vectorized backends and as the
/// fallback when AVX2 is unavailable.
pub(crate) fn permute4_portable(batch: &mut Batch4, rounds: u32) {
    for lane in 0..4 {
        let mut state = [0u64; 25];
        for word in 0..25 {
            state[word] = batch[word][lane];
        }
        permute(&mut state, rounds);
        for word in 0..25 {
            batch[word][lane] = state[word];
        }
    }
}

/// Runs `rounds` rounds of Keccak-f\[1600\] independently over each of the
/// 8 packed lanes. See [`permute4_portable`].
pub(crate) fn permute8_portable(batch: &mut Batch8, rounds: u32) {
    for lane in 0..8 {
        let mut state = [0u64; 25];
        for word in 0..25 {
            state[word] = batch[word][lane];
        }
        permute(&mut state, rounds);
        for word in 0..25 {
            batch[word][lane] = state[word];
        }
    }
}

/// Dispatches to the best available 4-way backend, selected once by the
/// caller via [`Backend::detect4`].
pub(crate) fn permute4(backend: Backend, batch: &mut Batch4, rounds: u32) {
    match backend {
        Backend::Portable | Backend::Avx512 => permute4_portable(batch, rounds),
        Backend::Avx2 => unsafe { permute4_avx2(batch, rounds) },
    }
}

/// Dispatches to the best available 8-way backend, selected once by the
/// caller via [`Backend::detect8`].
pub(crate) fn permute8(backend: Backend, batch: &mut Batch8, rounds: u32) {
    match backend {
        Backend::Portable => permute8_portable(batch, rounds),
        Backend::Avx2 => {
            // Fold two independent AVX2 4-lane passes over the low and
            // high halves of the 8-way batch.
            let mut lo: Batch4 = Default::default();
            let mut hi: Batch4 = Default::default();
            for word in 0..25 {
                lo[word] = [batch[word][0], batch[word][1], batch[word][2], batch[word][3]];
                hi[word] = [batch[word][4], batch[word][5], batch[word][6], batch[word][7]];
            }
            unsafe {
                permute4_avx2(&mut lo, rounds);
                permute4_avx2(&mut hi, rounds);
            }
            for word in 0..25 {
                batch[word] = [
                    lo[word][0], lo[word][1], lo[word][2], lo[word][3], hi[word][0], hi[word][1],
                    hi[word][2], hi[word][3],
                ];
            }
        }
        Backend::Avx512 => unsafe { permute8_avx512(batch, rounds) },
    }
}

#[target_feature(enable = "avx2")]
unsafe fn permute4_avx2(batch: &mut Batch4, rounds: u32) {
    let mut lanes: [__m256i; 25] =
        core::array::from_fn(|i| _mm256_loadu_si256(batch[i].as_ptr() as *const __m256i));

    let start = (MAX_ROUNDS - rounds) as usize;
    let mut c = [_mm256_setzero_si256(); 5];

    for round in start..MAX_ROUNDS as usize {
        for x in 0..5 {
            c[x] = _mm256_xor_si256(
                _mm256_xor_si256(lanes[x], lanes[x + 5]),
                _mm256_xor_si256(
                    _mm256_xor_si256(lanes[x + 10], lanes[x + 15]),
                    lanes[x + 20],
                ),
            );
        }
        for x in 0..5 {
            let rotated = rotl256(c[(x + 1) % 5], 1);
            let d = _mm256_xor_si256(c[(x + 4) % 5], rotated);
            for y in (0..25).step_by(5) {
                lanes[x + y] = _mm256_xor_si256(lanes[x + y], d);
            }
        }

        let mut a = lanes[1];
        for i in 0..24 {
            let tmp = lanes[PI[i]];
            lanes[PI[i]] = rotl256(a, RHO[i]);
            a = tmp;
        }

        for y in (0..25).step_by(5) {
            for x in 0..5 {
                c[x] = lanes[x + y];
            }
            for x in 0..5 {
                let not_and = _mm256_andnot_si256(c[(x + 1) % 5], c[(x + 2) % 5]);
                lanes[x + y] = _mm256_xor_si256(c[x], not_and);
            }
        }

        lanes[0] = _mm256_xor_si256(lanes[0], _mm256_set1_epi64x(RC[round] as i64));
    }

    for (i, lane) in lanes.iter().enumerate() {
        _mm256_storeu_si256(batch[i].as_mut_ptr() as *mut __m256i, *lane);
    }
}

#[target_feature(enable = "avx2")]
unsafe fn rotl256(x: __m256i, n: u32) -> __m256i {
    let left = _mm256_sllv_epi64(x, _mm256_set1_epi64x(n as i64));
    let right = _mm256_srlv_epi64(x, _mm256_set1_epi64x((64 - n) as i64));
    _mm256_or_si256(left, right)
}

#[target_feature(enable = "avx512f")]
unsafe fn permute8_avx512(batch: &mut Batch8, rounds: u32) {
    let mut lanes: [__m512i; 25] =
        core::array::from_fn(|i| _mm512_loadu_si512(batch[i].as_ptr() as *const _));

    let start = (MAX_ROUNDS - rounds) as usize;
    let mut c = [_mm512_setzero_si512(); 5];

    for round in start..MAX_ROUNDS as usize {
        for x in 0..5 {
            c[x] = _mm512_xor_si512(
                _mm512_xor_si512(lanes[x], lanes[x + 5]),
                _mm512_xor_si512(
                    _mm512_xor_si512(lanes[x + 10], lanes[x + 15]),
                    lanes[x + 20],
                ),
            );
        }
        for x in 0..5 {
            let rotated = _mm512_rol_epi64(c[(x + 1) % 5], 1);
            let d = _mm512_xor_si512(c[(x + 4) % 5], rotated);
            for y in (0..25).step_by(5) {
                lanes[x + y] = _mm512_xor_si512(lanes[x + y], d);
            }
        }

        let mut a = lanes[1];
        for i in 0..24 {
            let tmp = lanes[PI[i]];
            lanes[PI[i]] = _mm512_rol_epi64(a, RHO[i] as u32);
            a = tmp;
        }

        for y in (0..25).step_by(5) {
            for x in 0..5 {
                c[x] = lanes[x + y];
            }
            for x in 0..5 {
                let not_and = _mm512_andnot_si512(c[(x + 1) % 5], c[(x + 2) % 5]);
                lanes[x + y] = _mm512_xor_si512(c[x], not_and);
            }
        }

        lanes[0] = _mm512_xor_si512(lanes[0], _mm512_set1_epi64(RC[round] as i64));
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
        permute4_portable(&mut batch, MAX_ROUNDS);
        let mut scalar = [0u64; 25];
        permute(&mut scalar, MAX_ROUNDS);
        for word in 0..25 {
            for lane in 0..4 {
                assert_eq!(batch[word][lane], scalar[word]);
            }
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
        permute4_portable(&mut portable, MAX_ROUNDS);
        unsafe { permute4_avx2(&mut vectorized, MAX_ROUNDS) };
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
        permute8_portable(&mut portable, MAX_ROUNDS);
        unsafe { permute8_avx512(&mut vectorized, MAX_ROUNDS) };
        assert_eq!(portable, vectorized);
    }
}
