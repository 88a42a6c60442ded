//! KPA (C4): an 8-leaf parallel tree MAC built from reduced-round Keccak
//! permutations. KPA is not a NIST standard; it is this library's own
//! construction, designed to let 8 independent sponges absorb input and
//! permute in lockstep on SIMD-capable hardware while a single scalar
//! "parent" sponge folds their outputs into one tag.
//!
//! Each leaf differs only in the first two bytes of its 8-byte name
//! (`LEAF_NAME`), which carry a big-endian, 1-based leaf index; the
//! customization string and key are identical across leaves. Every leaf
//! permutation — both during initialization and incremental absorption —
//! runs [`MIN_ROUNDS`] rounds rather than the full 24, trading permutation
//! strength for the throughput the parallel construction is built for.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keccak::{self, DomainId, Rate, LANES, MIN_ROUNDS};
use crate::sponge::{bytepad, encode_string};

const LEAVES: usize = 8;
const LEAF_NAME: [u8; 8] = [0x00, 0x00, 0x4B, 0x42, 0x41, 0xAD, 0x31, 0x32];

fn leaf_name(index: usize) -> [u8; 8] {
    let mut name = LEAF_NAME;
    let idx = (index as u16 + 1).to_be_bytes();
    name[0] = idx[0];
    name[1] = idx[1];
    name
}

/// The per-leaf output width folded into the parent sponge: half the
/// capacity, mirroring the SHA-3 `hlen = (1600 - 2*rate) / 16` relation.
fn leaf_hash_len(rate: Rate) -> usize {
    (200 - rate.bytes()) / 2
}

fn absorb_aligned_leaf(lanes: &mut [u64; LANES], rate: Rate, aligned: &[u8]) {
    debug_assert_eq!(aligned.len() % rate.bytes(), 0);
    for block in aligned.chunks(rate.bytes()) {
        keccak::fast_absorb(lanes, block);
        keccak::permute(lanes, MIN_ROUNDS);
    }
}

/// The 8-way batched backend chosen once at construction, mirroring
/// [`crate::keccak::simd::Backend`] without requiring every caller to
/// depend on the `simd`-gated module directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Batching {
    Portable,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Avx2,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Avx512,
}

impl Batching {
    fn detect() -> Self {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        {
            match keccak::simd::Backend::detect8() {
                keccak::simd::Backend::Avx512 => return Batching::Avx512,
                keccak::simd::Backend::Avx2 => return Batching::Avx2,
                keccak::simd::Backend::Portable => return Batching::Portable,
            }
        }
        #[cfg(not(all(target_arch = "x86_64", feature = "simd")))]
        Batching::Portable
    }
}

fn permute_all_leaves(leaves: &mut [[u64; LANES]; LEAVES], backend: Batching) {
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    {
        if backend != Batching::Portable {
            let mut batch: keccak::simd::Batch8 = Default::default();
            for word in 0..LANES {
                for leaf in 0..LEAVES {
                    batch[word][leaf] = leaves[leaf][word];
                }
            }
            let inner = match backend {
                Batching::Avx512 => keccak::simd::Backend::Avx512,
                Batching::Avx2 => keccak::simd::Backend::Avx2,
                Batching::Portable => keccak::simd::Backend::Portable,
            };
            keccak::simd::permute8(inner, &mut batch, MIN_ROUNDS);
            for word in 0..LANES {
                for leaf in 0..LEAVES {
                    leaves[leaf][word] = batch[word][leaf];
                }
            }
            return;
        }
    }
    let _ = backend;
    for leaf in leaves.iter_mut() {
        keccak::permute(leaf, MIN_ROUNDS);
    }
}

/// An 8-leaf KPA parallel authenticator.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Kpa {
    leaf_lanes: [[u64; LANES]; LEAVES],
    leaf_buffer: [[u8; LANES * 8]; LEAVES],
    leaf_position: [usize; LEAVES],
    processed: u64,
    #[zeroize(skip)]
    rate: Rate,
    #[zeroize(skip)]
    backend: Batching,
}

impl Kpa {
    /// Constructs a KPA-128/256/512 instance (selected by `rate`) with the
    /// given key and customization string.
    ///
    /// Unlike KMAC/cSHAKE, the leaf name is never absorbed as framed
    /// message bytes: all 8 leaves share one "scratch" state built from
    /// `custom` (if non-empty) and `key` (if non-empty) alone, and only
    /// after that shared state is permuted do the leaves diverge — each
    /// leaf's copy gets its 1-based big-endian index XORed into lane 0.
    /// This mirrors `qsc_kpa_initialize`: the customization and key stages
    /// are each skipped entirely when their input is empty, rather than
    /// absorbing a zero-length framed block.
    fn new(rate: Rate, key: &[u8], custom: &[u8]) -> Self {
        let backend = Batching::detect();
        let mut scratch = [0u64; LANES];

        if !custom.is_empty() {
            let encoded_custom = encode_string(custom);
            let padded_custom = bytepad(&[&encoded_custom], rate.bytes());
            absorb_aligned_leaf(&mut scratch, rate, &padded_custom);
        }
        if !key.is_empty() {
            let encoded_key = encode_string(key);
            let padded_key = bytepad(&[&encoded_key], rate.bytes());
            absorb_aligned_leaf(&mut scratch, rate, &padded_key);
        }

        let mut leaf_lanes = [[0u64; LANES]; LEAVES];
        for (index, lanes) in leaf_lanes.iter_mut().enumerate() {
            *lanes = scratch;
            lanes[0] ^= u64::from_be_bytes(leaf_name(index));
        }
        permute_all_leaves(&mut leaf_lanes, backend);

        Kpa {
            leaf_lanes,
            leaf_buffer: [[0u8; LANES * 8]; LEAVES],
            leaf_position: [0usize; LEAVES],
            processed: 0,
            rate,
            backend,
        }
    }

    /// Constructs a KPA-128 instance.
    pub fn kpa128(key: &[u8], custom: &[u8]) -> Self {
        Kpa::new(Rate::R128, key, custom)
    }

    /// Constructs a KPA-256 instance.
    pub fn kpa256(key: &[u8], custom: &[u8]) -> Self {
        Kpa::new(Rate::R256, key, custom)
    }

    /// Constructs a KPA-512 instance.
    pub fn kpa512(key: &[u8], custom: &[u8]) -> Self {
        Kpa::new(Rate::R512, key, custom)
    }

    /// Absorbs more input, distributing it round-robin across the 8
    /// leaves in `rate`-sized chunks and permuting all 8 leaves in lockstep
    /// whenever every leaf's buffer fills.
    pub fn update(&mut self, mut input: &[u8]) {
        let rate_len = self.rate.bytes();
        self.processed += input.len() as u64;

        while !input.is_empty() {
            for leaf in 0..LEAVES {
                if input.is_empty() {
                    break;
                }
                let pos = self.leaf_position[leaf];
                let take = core::cmp::min(rate_len - pos, input.len());
                self.leaf_buffer[leaf][pos..pos + take].copy_from_slice(&input[..take]);
                self.leaf_position[leaf] += take;
                input = &input[take..];
            }

            if self.leaf_position.iter().all(|&p| p == rate_len) {
                for leaf in 0..LEAVES {
                    keccak::fast_absorb(&mut self.leaf_lanes[leaf], &self.leaf_buffer[leaf][..rate_len]);
                }
                permute_all_leaves(&mut self.leaf_lanes, self.backend);
                self.leaf_position = [0usize; LEAVES];
            }
        }
    }

    /// Finalizes the MAC, writing `output.len()` bytes of tag.
    ///
    /// The leaves receive no domain byte or padding bit of their own —
    /// only, if any leaf has unfinished data, a zero-padded tail absorb
    /// and one more lockstep permute (`qsc_kpa_finalize`'s single linear
    /// buffer clear-then-absorb, reproduced per leaf). The domain byte and
    /// `0x80` padding bit belong exclusively to the parent's final block.
    /// The parent itself runs entirely at [`MIN_ROUNDS`] on a raw lane
    /// array, not through [`keccak::KeccakState`] (which hardcodes the
    /// full 24 rounds): it absorbs the 8 leaves' truncated outputs, then a
    /// `right_encode(outlen*8) || right_encode(processed*8)` suffix
    /// followed by the KPA domain byte and `0x80` padding, before
    /// squeezing the tag a rate-sized block at a time.
    pub fn finalize(mut self, output: &mut [u8]) {
        let rate_len = self.rate.bytes();

        if self.leaf_position.iter().any(|&p| p != 0) {
            for leaf in 0..LEAVES {
                let pos = self.leaf_position[leaf];
                self.leaf_buffer[leaf][pos..rate_len].fill(0);
                keccak::fast_absorb(&mut self.leaf_lanes[leaf], &self.leaf_buffer[leaf][..rate_len]);
            }
            for leaf in self.leaf_lanes.iter_mut() {
                keccak::permute(leaf, MIN_ROUNDS);
            }
        }

        let hash_len = leaf_hash_len(self.rate);
        let mut parent = ParentAbsorb::new(rate_len);
        for leaf in 0..LEAVES {
            let mut bytes = [0u8; LANES * 8];
            for (chunk, lane) in bytes.chunks_mut(8).zip(self.leaf_lanes[leaf].iter()) {
                chunk.copy_from_slice(&lane.to_le_bytes());
            }
            parent.absorb(&bytes[..hash_len]);
        }
        // `kpa_absorb_leaves` permutes any partial block of leaf-hash data
        // immediately, before the right_encode suffix below ever enters the
        // buffer — the suffix always starts its own (possibly partial)
        // block rather than continuing to share one with the leaf hashes.
        parent.flush_partial_block();

        let mut outlen_buf = [0u8; 9];
        let n = keccak::right_encode(&mut outlen_buf, (output.len() as u64) * 8);
        parent.absorb(&outlen_buf[..n]);

        let mut processed_buf = [0u8; 9];
        let m = keccak::right_encode(&mut processed_buf, self.processed * 8);
        parent.absorb(&processed_buf[..m]);

        parent.finish_and_squeeze(DomainId::Kpa, output);
    }
}

/// A minimal absorb/squeeze accumulator for the parent sponge, operating
/// directly on a raw lane array at [`MIN_ROUNDS`] throughout — KPA's
/// parent never runs the full 24-round permutation, so it can't reuse
/// [`keccak::KeccakState`].
struct ParentAbsorb {
    lanes: [u64; LANES],
    buffer: [u8; LANES * 8],
    position: usize,
    rate_len: usize,
}

impl ParentAbsorb {
    fn new(rate_len: usize) -> Self {
        ParentAbsorb {
            lanes: [0u64; LANES],
            buffer: [0u8; LANES * 8],
            position: 0,
            rate_len,
        }
    }

    fn absorb(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = core::cmp::min(self.rate_len - self.position, data.len());
            self.buffer[self.position..self.position + take].copy_from_slice(&data[..take]);
            self.position += take;
            data = &data[take..];
            if self.position == self.rate_len {
                keccak::fast_absorb(&mut self.lanes, &self.buffer[..self.rate_len]);
                keccak::permute(&mut self.lanes, MIN_ROUNDS);
                self.position = 0;
            }
        }
    }

    /// Zero-pads and permutes any partially-filled block immediately,
    /// rather than letting it carry over and share a block with whatever
    /// is absorbed next. A no-op if the buffer is currently empty.
    fn flush_partial_block(&mut self) {
        if self.position == 0 {
            return;
        }
        self.buffer[self.position..self.rate_len].fill(0);
        keccak::fast_absorb(&mut self.lanes, &self.buffer[..self.rate_len]);
        keccak::permute(&mut self.lanes, MIN_ROUNDS);
        self.position = 0;
    }

    fn finish_and_squeeze(mut self, domain: DomainId, output: &mut [u8]) {
        let rate_len = self.rate_len;
        let mut block = [0u8; LANES * 8];
        block[..self.position].copy_from_slice(&self.buffer[..self.position]);
        block[self.position] ^= domain.byte();
        block[rate_len - 1] |= 0x80;
        keccak::fast_absorb(&mut self.lanes, &block[..rate_len]);

        for chunk in output.chunks_mut(rate_len) {
            keccak::permute(&mut self.lanes, MIN_ROUNDS);
            let mut bytes = [0u8; LANES * 8];
            for (out, lane) in bytes.chunks_mut(8).zip(self.lanes.iter()) {
                out.copy_from_slice(&lane.to_le_bytes());
            }
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
