//! SHA-3, SHAKE, cSHAKE and KMAC (C3): the fixed- and extendable-output
//! sponge constructions built on the Keccak-f\[1600\] core in
//! [`crate::keccak`].
//!
//! cSHAKE and KMAC's `N`/`S`/`K` framing needs variable-length
//! `left_encode`/`bytepad` prefixes (NIST SP 800-185 §2.3), so the
//! constructors here allocate; that's the reason this module — like the
//! rest of the crate's sponge layer — is gated on the `std` feature.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keccak::{left_encode, DomainId, KeccakState, Rate};

const KMAC_NAME: &[u8] = b"KMAC";

pub(crate) fn encode_string(s: &[u8]) -> Vec<u8> {
    let mut buf = [0u8; 9];
    let n = left_encode(&mut buf, (s.len() as u64).saturating_mul(8));
    let mut out = Vec::with_capacity(n + s.len());
    out.extend_from_slice(&buf[..n]);
    out.extend_from_slice(s);
    out
}

pub(crate) fn bytepad(parts: &[&[u8]], rate: usize) -> Vec<u8> {
    let mut buf = [0u8; 9];
    let n = left_encode(&mut buf, rate as u64);
    let mut out = Vec::with_capacity(rate * 2);
    out.extend_from_slice(&buf[..n]);
    for part in parts {
        out.extend_from_slice(part);
    }
    while out.len() % rate != 0 {
        out.push(0);
    }
    out
}

/// Absorbs a bytepad-padded, rate-aligned prefix directly, bypassing the
/// incremental buffer: cSHAKE/KMAC framing is constructed to always be a
/// whole number of blocks.
fn absorb_aligned(state: &mut KeccakState, rate: Rate, aligned: &[u8]) {
    debug_assert_eq!(aligned.len() % rate.bytes(), 0);
    for block in aligned.chunks(rate.bytes()) {
        crate::keccak::fast_absorb(&mut state.lanes, block);
        state.permute(crate::keccak::MAX_ROUNDS);
    }
}

/// Applies the cSHAKE `N`/`S` prefix to a freshly constructed state. When
/// both are empty, cSHAKE degenerates to plain SHAKE (no prefix, domain
/// `0x1F` instead of `0x04`) per SP 800-185 §3.2.
fn cshake_init(state: &mut KeccakState, rate: Rate, name: &[u8], custom: &[u8]) -> DomainId {
    if name.is_empty() && custom.is_empty() {
        return DomainId::Shake;
    }
    let encoded_name = encode_string(name);
    let encoded_custom = encode_string(custom);
    let prefix = bytepad(&[&encoded_name, &encoded_custom], rate.bytes());
    absorb_aligned(state, rate, &prefix);
    DomainId::CShake
}

/// Applies the KMAC framing: the cSHAKE `"KMAC"`/`S` prefix block(s),
/// followed by a second bytepad block carrying the key.
fn kmac_init(state: &mut KeccakState, rate: Rate, custom: &[u8], key: &[u8]) {
    cshake_init(state, rate, KMAC_NAME, custom);
    let encoded_key = encode_string(key);
    let padded_key = bytepad(&[&encoded_key], rate.bytes());
    absorb_aligned(state, rate, &padded_key);
}

/// A one-shot or incremental SHA-3 fixed-output hash.
pub struct Sha3 {
    state: KeccakState,
    rate: Rate,
}

macro_rules! sha3_variant {
    ($ctor:ident, $rate:expr, $outlen:literal) => {
        #[doc = concat!("Constructs a SHA3-", stringify!($outlen), " hasher.")]
        pub fn $ctor() -> Self {
            Sha3 {
                state: KeccakState::default(),
                rate: $rate,
            }
        }
    };
}

impl Sha3 {
    sha3_variant!(sha3_256, Rate::R256, 256);
    sha3_variant!(sha3_384, Rate::R384, 384);
    sha3_variant!(sha3_512, Rate::R512, 512);

    /// Absorbs more input.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(self.rate, data);
    }

    /// Finalizes the hash, writing `output.len()` bytes (the digest's
    /// natural length: 32/48/64 for SHA3-256/384/512).
    pub fn finalize(mut self, output: &mut [u8]) {
        self.state.squeeze(self.rate, DomainId::Sha3, output);
    }
}

/// A SHAKE extendable-output function.
pub struct Shake {
    state: KeccakState,
    rate: Rate,
}

impl Shake {
    /// Constructs a SHAKE-128 instance.
    pub fn shake128() -> Self {
        Shake {
            state: KeccakState::default(),
            rate: Rate::R128,
        }
    }

    /// Constructs a SHAKE-256 instance.
    pub fn shake256() -> Self {
        Shake {
            state: KeccakState::default(),
            rate: Rate::R256,
        }
    }

    /// Absorbs more input. Must be called before the first [`Shake::squeeze`].
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(self.rate, data);
    }

    /// Squeezes `output.len()` more bytes of output. May be called
    /// repeatedly to extend the output stream.
    pub fn squeeze(&mut self, output: &mut [u8]) {
        self.state.squeeze(self.rate, DomainId::Shake, output);
    }
}

/// A cSHAKE extendable-output function with a function name `N` and
/// customization string `S`.
pub struct CShake {
    state: KeccakState,
    rate: Rate,
    domain: DomainId,
}

impl CShake {
    /// Constructs a cSHAKE-128 instance with the given name and
    /// customization strings.
    pub fn cshake128(name: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        let domain = cshake_init(&mut state, Rate::R128, name, custom);
        CShake {
            state,
            rate: Rate::R128,
            domain,
        }
    }

    /// Constructs a cSHAKE-256 instance with the given name and
    /// customization strings.
    pub fn cshake256(name: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        let domain = cshake_init(&mut state, Rate::R256, name, custom);
        CShake {
            state,
            rate: Rate::R256,
            domain,
        }
    }

    /// Constructs a cSHAKE-512 instance with the given name and
    /// customization strings. Used by CSX (C7) to derive its cipher and
    /// MAC keys from a single user key.
    pub fn cshake512(name: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        let domain = cshake_init(&mut state, Rate::R512, name, custom);
        CShake {
            state,
            rate: Rate::R512,
            domain,
        }
    }

    /// Absorbs more input.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(self.rate, data);
    }

    /// Squeezes `output.len()` more bytes of output.
    pub fn squeeze(&mut self, output: &mut [u8]) {
        self.state.squeeze(self.rate, self.domain, output);
    }
}

/// A KMAC keyed message authentication code, built on cSHAKE with the
/// reserved function name `"KMAC"`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Kmac {
    state: KeccakState,
    #[zeroize(skip)]
    rate: Rate,
}

impl Kmac {
    /// Constructs a KMAC-128 instance with the given key and customization
    /// string.
    pub fn kmac128(key: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        kmac_init(&mut state, Rate::R128, custom, key);
        Kmac {
            state,
            rate: Rate::R128,
        }
    }

    /// Constructs a KMAC-256 instance with the given key and customization
    /// string.
    pub fn kmac256(key: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        kmac_init(&mut state, Rate::R256, custom, key);
        Kmac {
            state,
            rate: Rate::R256,
        }
    }

    /// Constructs a KMAC-512 instance with the given key and customization
    /// string.
    pub fn kmac512(key: &[u8], custom: &[u8]) -> Self {
        let mut state = KeccakState::default();
        kmac_init(&mut state, Rate::R512, custom, key);
        Kmac {
            state,
            rate: Rate::R512,
        }
    }

    /// Absorbs more input.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(self.rate, data);
    }

    /// Finalizes the MAC, writing `output.len()` bytes of tag. KMAC's
    /// finalization appends `right_encode(output.len() * 8)` to the message
    /// before the final padding, so the tag depends on the requested
    /// length (SP 800-185 §4).
    pub fn finalize(mut self, output: &mut [u8]) {
        let mut buf = [0u8; 9];
        let n = crate::keccak::right_encode(&mut buf, (output.len() as u64) * 8);
        self.state.update(self.rate, &buf[..n]);
        self.state.squeeze(self.rate, DomainId::Kmac, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_empty_string_kat() {
        let mut out = [0u8; 32];
        Sha3::sha3_256().finalize(&mut out);
        assert_eq!(
            hex::encode(out),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434"
        );
    }

    #[test]
    fn sha3_512_abc_kat() {
        let mut hasher = Sha3::sha3_512();
        hasher.update(b"abc");
        let mut out = [0u8; 64];
        hasher.finalize(&mut out);
        assert_eq!(
            hex::encode(out),
            "b751850b1a57168a5693cd924b6b096e08f621827444f70d884f5d0240d2712\
             e10e116e9192af3c91a7ec57647e3934057340b4cf408d5a56592f8274eec53f0"
        );
    }

    #[test]
    fn shake128_empty_string_kat() {
        let mut shake = Shake::shake128();
        let mut out = [0u8; 32];
        shake.squeeze(&mut out);
        assert_eq!(
            hex::encode(out),
            "7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef2"
        );
    }

    #[test]
    fn cshake_with_empty_name_and_custom_matches_shake() {
        let mut cshake = CShake::cshake128(b"", b"");
        let mut shake = Shake::shake128();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        cshake.squeeze(&mut a);
        shake.squeeze(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn kmac_output_length_affects_tag() {
        let key = b"0123456789ABCDEF0123456789ABCDE";
        let mut short = [0u8; 32];
        let mut long = [0u8; 64];

        Kmac::kmac256(key, b"").finalize(&mut short);
        Kmac::kmac256(key, b"").finalize(&mut long);

        assert_ne!(&short[..], &long[..32]);
    }

    #[test]
    fn kmac_is_deterministic() {
        let key = b"test key for kmac determinism..";
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        let mut mac_a = Kmac::kmac256(key, b"custom");
        mac_a.update(b"message");
        mac_a.finalize(&mut a);
        let mut mac_b = Kmac::kmac256(key, b"custom");
        mac_b.update(b"message");
        mac_b.finalize(&mut b);
        assert_eq!(a, b);
    }
}
