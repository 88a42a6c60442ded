//! Batched SHAKE/KMAC (C5): N independent sponges advanced in lockstep,
//! built directly on the batched permutations in [`crate::keccak::simd`].
//!
//! Unlike KPA (C4), these lanes are fully independent — there is no parent
//! sponge folding their outputs together. This is the primitive the wide
//! stream ciphers (RCS, CSX) reach for when they need several keystream
//! blocks at once: each lane absorbs its own domain-separated counter
//! block and squeezes its own output, and the batching is purely a
//! throughput optimization. The portable fallback loops the scalar
//! permutation once per lane and is definitionally equivalent to the
//! vectorized backends — same inputs, same outputs, different instruction
//! count.

use crate::keccak::{DomainId, Rate, LANES};
use crate::sponge::{bytepad, encode_string};

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
use crate::keccak::simd::{self, Backend};

/// Absorbs a bytepad-aligned prefix into one lane's raw state, permuting
/// between every block, without applying a domain byte — the one-lane
/// building block `new_kmac` uses to frame the cSHAKE `"KMAC"`/`S` prefix
/// and the key block ahead of the message, mirroring `sponge::absorb_aligned`.
fn absorb_prefix(lanes: &mut [u64; LANES], rate: Rate, aligned: &[u8]) {
    for block in aligned.chunks(rate.bytes()) {
        crate::keccak::fast_absorb(lanes, block);
        crate::keccak::permute(lanes, crate::keccak::MAX_ROUNDS);
    }
}

/// A batch of 4 independent Keccak sponge states processed in lockstep.
pub struct Batch4State {
    lanes: [[u64; LANES]; 4],
    buffer: [[u8; LANES * 8]; 4],
    position: [usize; 4],
    rate: Rate,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    backend: Backend,
}

/// A batch of 8 independent Keccak sponge states processed in lockstep.
pub struct Batch8State {
    lanes: [[u64; LANES]; 8],
    buffer: [[u8; LANES * 8]; 8],
    position: [usize; 8],
    rate: Rate,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    backend: Backend,
}

macro_rules! batch_impl {
    ($name:ident, $width:literal, $permute_batch:ident, $detect:ident, $batch_ty:path) => {
        impl $name {
            /// Constructs a batch of independent sponges, one per lane,
            /// absorbing a distinct `shake128`/`shake256` input already
            /// (caller supplies per-lane domain separation, e.g. a block
            /// counter appended to each `inputs[i]`).
            pub fn new(rate: Rate, inputs: [&[u8]; $width]) -> Self {
                #[cfg(all(target_arch = "x86_64", feature = "simd"))]
                let backend = Backend::$detect();

                let mut lanes = [[0u64; LANES]; $width];
                for (lane, input) in lanes.iter_mut().zip(inputs.iter()) {
                    crate::keccak::absorb(lane, rate, input, DomainId::Shake);
                }

                $name {
                    lanes,
                    buffer: [[0u8; LANES * 8]; $width],
                    position: [0usize; $width],
                    rate,
                    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
                    backend,
                }
            }

            /// Constructs a batch of independent KMAC instances, one per
            /// lane, each with its own key and customization string,
            /// finalized in one shot against the requested per-lane output
            /// length (`outlens`) — the batched counterpart to
            /// [`crate::sponge::Kmac::kmac256`]/`kmac512`'s one-shot
            /// construction, for callers who need several independent tags
            /// computed in lockstep.
            pub fn new_kmac(
                rate: Rate,
                keys: [&[u8]; $width],
                customs: [&[u8]; $width],
                messages: [&[u8]; $width],
                outlens: [usize; $width],
            ) -> Self {
                #[cfg(all(target_arch = "x86_64", feature = "simd"))]
                let backend = Backend::$detect();

                let mut lanes = [[0u64; LANES]; $width];
                for lane in 0..$width {
                    let encoded_name = encode_string(b"KMAC");
                    let encoded_custom = encode_string(customs[lane]);
                    let prefix = bytepad(&[&encoded_name, &encoded_custom], rate.bytes());
                    absorb_prefix(&mut lanes[lane], rate, &prefix);

                    let encoded_key = encode_string(keys[lane]);
                    let padded_key = bytepad(&[&encoded_key], rate.bytes());
                    absorb_prefix(&mut lanes[lane], rate, &padded_key);

                    let mut suffix = [0u8; 9];
                    let n = crate::keccak::right_encode(&mut suffix, (outlens[lane] as u64) * 8);
                    let mut message = messages[lane].to_vec();
                    message.extend_from_slice(&suffix[..n]);
                    crate::keccak::absorb(&mut lanes[lane], rate, &message, DomainId::Kmac);
                }

                $name {
                    lanes,
                    buffer: [[0u8; LANES * 8]; $width],
                    position: [0usize; $width],
                    rate,
                    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
                    backend,
                }
            }

            /// Squeezes `rate` bytes from every lane into `outputs`,
            /// permuting all lanes in a single batched call.
            pub fn squeeze_block(&mut self, outputs: &mut [&mut [u8]; $width]) {
                let rate_len = self.rate.bytes();

                #[cfg(all(target_arch = "x86_64", feature = "simd"))]
                {
                    let mut batch: $batch_ty = Default::default();
                    for word in 0..LANES {
                        for lane in 0..$width {
                            batch[word][lane] = self.lanes[lane][word];
                        }
                    }
                    simd::$permute_batch(self.backend, &mut batch, crate::keccak::MAX_ROUNDS);
                    for word in 0..LANES {
                        for lane in 0..$width {
                            self.lanes[lane][word] = batch[word][lane];
                        }
                    }
                }
                #[cfg(not(all(target_arch = "x86_64", feature = "simd")))]
                {
                    for lane in self.lanes.iter_mut() {
                        crate::keccak::permute(lane, crate::keccak::MAX_ROUNDS);
                    }
                }

                for (lane, out) in self.lanes.iter().zip(outputs.iter_mut()) {
                    let mut bytes = [0u8; LANES * 8];
                    for (chunk, word) in bytes.chunks_mut(8).zip(lane.iter()) {
                        chunk.copy_from_slice(&word.to_le_bytes());
                    }
                    let take = core::cmp::min(rate_len, out.len());
                    out[..take].copy_from_slice(&bytes[..take]);
                }
            }
        }
    };
}

batch_impl!(Batch4State, 4, permute4, detect4, simd::Batch4);
batch_impl!(Batch8State, 8, permute8, detect8, simd::Batch8);
