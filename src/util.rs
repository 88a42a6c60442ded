//! Byte/word utilities shared by the sponge and cipher layers.
//!
//! These are the Rust equivalents of the excluded C `intutils`/`memutils`
//! contracts (see `spec.md` §1): little/big-endian pack and unpack, span-wise
//! `clear`/`copy`/`xor`/`setvalue`, and a constant-time `verify`.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use subtle::ConstantTimeEq;

/// Reads a little-endian `u16` from the first 2 bytes of `bytes`.
#[inline(always)]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    LittleEndian::read_u16(bytes)
}

/// Reads a little-endian `u32` from the first 4 bytes of `bytes`.
#[inline(always)]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    LittleEndian::read_u32(bytes)
}

/// Reads a little-endian `u64` from the first 8 bytes of `bytes`.
#[inline(always)]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    LittleEndian::read_u64(bytes)
}

/// Reads a big-endian `u32` from the first 4 bytes of `bytes`.
#[inline(always)]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    BigEndian::read_u32(bytes)
}

/// Reads a big-endian `u64` from the first 8 bytes of `bytes`.
#[inline(always)]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    BigEndian::read_u64(bytes)
}

/// Writes `value` as little-endian bytes into the first 4 bytes of `out`.
#[inline(always)]
pub fn write_u32_le(out: &mut [u8], value: u32) {
    LittleEndian::write_u32(out, value)
}

/// Writes `value` as little-endian bytes into the first 8 bytes of `out`.
#[inline(always)]
pub fn write_u64_le(out: &mut [u8], value: u64) {
    LittleEndian::write_u64(out, value)
}

/// Writes `value` as big-endian bytes into the first 2 bytes of `out`.
#[inline(always)]
pub fn write_u16_be(out: &mut [u8], value: u16) {
    BigEndian::write_u16(out, value)
}

/// Zeroes every byte in `span`.
#[inline(always)]
pub fn clear(span: &mut [u8]) {
    span.fill(0);
}

/// Copies `src` into the front of `dst`. Panics if `dst` is shorter than `src`.
#[inline(always)]
pub fn copy(dst: &mut [u8], src: &[u8]) {
    dst[..src.len()].copy_from_slice(src);
}

/// XORs `src` into the front of `dst` in place.
#[inline(always)]
pub fn xor(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// Sets every byte of `span` to `value`.
#[inline(always)]
pub fn setvalue(span: &mut [u8], value: u8) {
    span.fill(value);
}

/// XORs the single byte `value` into every byte of `span`.
#[inline(always)]
pub fn xorv(span: &mut [u8], value: u8) {
    for b in span.iter_mut() {
        *b ^= value;
    }
}

/// Constant-time equality check: returns `true` iff `a == b`, with running
/// time dependent only on `a.len()`. Returns `false` immediately (in
/// non-constant time) if the lengths differ; tags compared by this
/// function are always the statically known MAC length, so the length
/// check never leaks anything about secret data.
#[inline(always)]
pub fn verify(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut buf = [0u8; 8];
        write_u64_le(&mut buf, 0x0123_4567_89ab_cdef);
        assert_eq!(read_u64_le(&buf), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn verify_detects_mismatch() {
        assert!(verify(b"abcd", b"abcd"));
        assert!(!verify(b"abcd", b"abce"));
        assert!(!verify(b"abcd", b"abc"));
    }

    #[test]
    fn xor_and_clear() {
        let mut buf = [0xffu8; 4];
        xor(&mut buf, &[0x0f, 0x0f, 0x0f, 0x0f]);
        assert_eq!(buf, [0xf0, 0xf0, 0xf0, 0xf0]);
        clear(&mut buf);
        assert_eq!(buf, [0, 0, 0, 0]);
    }
}
