#![cfg_attr(not(feature = "std"), no_std)]
//! Keccak-f\[1600\] permutation primitives, the NIST SHA-3 family built on
//! top of it, and two wide-block authenticated stream ciphers (RCS and
//! CSX) that derive their keys and tags from the same sponge.
//!
//! - [`keccak`] — the portable and batched (AVX2/AVX-512) Keccak-f\[1600\]
//!   permutation (C1/C2).
//! - [`sponge`] — SHA3, SHAKE, cSHAKE and KMAC (C3).
//! - [`kpa`] — KPA, this library's own 8-leaf parallel tree MAC (C4).
//! - [`parallel`] — batched SHAKE/KMAC lanes for callers who need several
//!   independent sponges advanced in lockstep (C5).
//! - [`rcs`] — the RCS wide-block cipher (C6).
//! - [`csx`] — the CSX wide-block cipher (C7).
//!
//! Every public constructor validates its arguments and returns [`Result`]
//! rather than panicking or aborting; the one exception is misuse of the
//! cipher phase state machine (calling `seal`/`open` before `start`), which
//! is a programmer error treated as an `assert`/`expect`-worthy bug rather
//! than a recoverable condition.

pub mod aead;
pub mod csx;
pub mod keccak;
pub mod kpa;
pub mod parallel;
pub mod rcs;
pub mod sponge;
pub mod util;

pub use crate::csx::{Csx, CsxVariant};
pub use crate::kpa::Kpa;
pub use crate::rcs::{Rcs, RcsVariant};
pub use crate::sponge::{CShake, Kmac, Sha3, Shake};

/// Errors returned at the crate's public boundaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cipher key was the wrong length for the requested variant.
    #[error("invalid key length: expected one of {expected:?}, got {actual}")]
    InvalidKeyLength {
        expected: &'static [usize],
        actual: usize,
    },
    /// A CTR nonce/counter was the wrong length for the requested variant.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },
    /// `set_associated` was called more than once, or after the first
    /// `seal`/`open` call for the current nonce.
    #[error("associated data must be set at most once, before the first transform")]
    AlreadyAssociatedAfterTransform,
    /// An output buffer was shorter than the digest/tag it must receive.
    #[error("output buffer too short: need at least {needed} bytes, got {actual}")]
    OutputTooShort { needed: usize, actual: usize },
}

/// The crate's result alias.
pub type Result<T> = core::result::Result<T, Error>;
