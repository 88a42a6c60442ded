//! The authenticated-envelope pieces shared by RCS (C6) and CSX (C7):
//! the `Mac` backend (KMAC or KPA, selected at compile time by feature
//! flag), the `CipherPhase` state machine every sealed/opened stream moves
//! through, and the length-suffix framing `set_associated` uses on both
//! ciphers.
//!
//! Both ciphers are wide-block CTR stream ciphers wrapped in the same
//! envelope: associated data is bound in before any ciphertext, then every
//! `transform` call MACs the nonce snapshot, runs the block transform, and
//! MACs the resulting ciphertext — encrypt appends the tag, decrypt
//! verifies it in constant time before releasing plaintext. This mirrors
//! the absorb/squeeze phase split a keyed duplex sponge enforces between
//! its absorb and squeeze calls, generalized here to two independent wide
//! block ciphers instead of one sponge.

use zeroize::Zeroize;

use crate::kpa::Kpa;
use crate::sponge::Kmac;

/// The state machine a sealed or opened stream moves through. Both RCS and
/// CSX enforce the same ordering: associated data (if any) must be set
/// before the first `transform`, and never again after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CipherPhase {
    Created,
    AssociatedData,
    Transforming,
}

/// The authentication backend producing a cipher's tag: KMAC by default,
/// or the KPA parallel tree MAC under the `rcs-kpa`/csx `csx-kmacr12`
/// feature split described in `spec.md` §6.
pub(crate) enum Mac {
    Kmac(Kmac),
    Kpa(Kpa),
}

impl Mac {
    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Mac::Kmac(m) => m.update(data),
            Mac::Kpa(m) => m.update(data),
        }
    }

    pub(crate) fn finalize(self, tag: &mut [u8]) {
        match self {
            Mac::Kmac(m) => m.finalize(tag),
            Mac::Kpa(m) => m.finalize(tag),
        }
    }
}

/// Appends the little-endian 32-bit length of `ad` after MACing it in,
/// binding the associated data's length as well as its content. Used
/// identically by `RcsState::set_associated` and `CsxState::set_associated`.
pub(crate) fn mac_associated_data(mac: &mut Mac, ad: &[u8]) {
    mac.update(ad);
    let mut len_buf = [0u8; 4];
    crate::util::write_u32_le(&mut len_buf, ad.len() as u32);
    mac.update(&len_buf);
}

/// Constant-time tag comparison, used by both ciphers' `open`/`open_mut` to
/// decide authenticity without leaking timing information about where a
/// forged tag first diverges.
pub(crate) fn verify_tag(expected: &[u8], received: &[u8]) -> bool {
    crate::util::verify(expected, received)
}

/// Zeroizes `tag` after a failed verification, so a caller who ignores the
/// `bool`/`Option` result still can't read the unauthenticated tag back out
/// of a reused buffer.
pub(crate) fn scrub_on_failure(tag: &mut [u8], authentic: bool) {
    if !authentic {
        tag.zeroize();
    }
}
