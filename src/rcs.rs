//! RCS (C6): a wide-block Rijndael variant run in CTR mode and
//! authenticated with KMAC (or, under the `rcs-kpa` feature, KPA).
//!
//! RCS generalizes AES's 4x4-byte state to a wider 8-column (256-bit)
//! state, widening `ShiftRows` and `MixColumns` to operate across the
//! extra columns; both variants share the same 32-byte block and differ
//! only in key size (32/64 bytes) and round count (22 and 30
//! respectively, versus AES-256's 14). Round keys and the authentication
//! key are both derived from the secret key with a single continued
//! cSHAKE squeeze (cSHAKE-256 for RCS-256, cSHAKE-512 for RCS-512), so
//! the cipher key and MAC key can never collide.
//!
//! CTR mode never runs the cipher backwards, so there is no inverse round
//! function here — only the forward `SubBytes`/`ShiftRows`/`MixColumns`/
//! `AddRoundKey` sequence AES-NI's `aesenc` instruction also implements,
//! one call per 128-bit lane of the wide block.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{mac_associated_data, verify_tag, CipherPhase, Mac};
use crate::sponge::{CShake, Kmac};
use crate::util::write_u64_le;
use crate::{Error, Result};

#[cfg(all(target_arch = "x86_64", feature = "aesni"))]
mod aesni;
mod tables;

/// Which wide-block variant a cipher instance runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcsVariant {
    /// 256-bit block, 256-bit key, 22 rounds.
    Rcs256,
    /// 256-bit block, 512-bit key, 30 rounds.
    Rcs512,
}

impl RcsVariant {
    /// The wide block is 32 bytes (8 columns) for *both* variants; RCS-512
    /// differs from RCS-256 only in key size and round count, never block
    /// width (`rcs_transform_256`/`rcs_mix_columns`/`rcs_add_roundkey` in
    /// the reference implementation all operate on the one shared
    /// `QSC_RCS_BLOCK_SIZE` regardless of variant).
    const fn block_size(self) -> usize {
        32
    }

    const fn key_size(self) -> usize {
        match self {
            RcsVariant::Rcs256 => 32,
            RcsVariant::Rcs512 => 64,
        }
    }

    const fn rounds(self) -> u32 {
        match self {
            RcsVariant::Rcs256 => 22,
            RcsVariant::Rcs512 => 30,
        }
    }

    const fn columns(self) -> usize {
        self.block_size() / 4
    }

    /// The cSHAKE customization name baked into the key schedule, exactly
    /// as `rcs256_name`/`rcs512_name` in the reference implementation's
    /// authenticated build (`QSC_RCS_AUTHENTICATED`): a fixed 10-byte
    /// version/id prefix followed by the ASCII variant tag.
    const fn name(self) -> &'static [u8; 17] {
        match self {
            RcsVariant::Rcs256 => &[
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x52, 0x43, 0x53, 0x4B,
                0x32, 0x35, 0x36,
            ],
            RcsVariant::Rcs512 => &[
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x52, 0x43, 0x53, 0x4B,
                0x35, 0x31, 0x32,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    TableBased,
    #[cfg(all(target_arch = "x86_64", feature = "aesni"))]
    AesNi,
}

impl Backend {
    fn detect() -> Backend {
        #[cfg(all(target_arch = "x86_64", feature = "aesni"))]
        {
            if is_x86_feature_detected!("aes") && is_x86_feature_detected!("sse2") {
                return Backend::AesNi;
            }
        }
        Backend::TableBased
    }
}

/// A round key schedule, widened to the variant's block size.
#[derive(Zeroize, ZeroizeOnDrop)]
enum RoundKeys {
    /// `(rounds + 1)` flat round keys, each `block_size` bytes, laid out
    /// back to back.
    TableBased(Vec<u8>),
}

/// An RCS stream cipher instance, bound to one key and ready to process
/// one or more nonces.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Rcs {
    #[zeroize(skip)]
    variant: RcsVariant,
    #[zeroize(skip)]
    backend: Backend,
    round_keys: RoundKeys,
    mac_key: Vec<u8>,
    #[zeroize(skip)]
    phase: CipherPhase,
    processed: u64,
    #[zeroize(skip)]
    mac: Option<Mac>,
}

fn secure_expand(variant: RcsVariant, key: &[u8], info: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut xof = match variant {
        RcsVariant::Rcs256 => CShake::cshake256(variant.name(), info),
        RcsVariant::Rcs512 => CShake::cshake512(variant.name(), info),
    };
    xof.update(key);

    let schedule_len = (variant.rounds() as usize + 1) * variant.block_size();
    let mut round_key_bytes = vec![0u8; schedule_len];
    xof.squeeze(&mut round_key_bytes);

    let mac_key_len = variant.key_size();
    let mut mac_key = vec![0u8; mac_key_len];
    xof.squeeze(&mut mac_key);

    (round_key_bytes, mac_key)
}

impl Rcs {
    /// Constructs an RCS cipher bound to `key`, with an optional `info`
    /// string mixed into the key schedule's cSHAKE customization (empty is
    /// fine). `key` must be exactly `variant.key_size()` bytes.
    pub fn new(variant: RcsVariant, key: &[u8], info: &[u8]) -> Result<Self> {
        if key.len() != variant.key_size() {
            return Err(Error::InvalidKeyLength {
                expected: match variant {
                    RcsVariant::Rcs256 => &[32],
                    RcsVariant::Rcs512 => &[64],
                },
                actual: key.len(),
            });
        }

        let (round_key_bytes, mac_key) = secure_expand(variant, key, info);
        let backend = Backend::detect();

        Ok(Rcs {
            variant,
            backend,
            round_keys: RoundKeys::TableBased(round_key_bytes),
            mac_key,
            phase: CipherPhase::Created,
            processed: 0,
            mac: None,
        })
    }

    fn new_mac(&self) -> Mac {
        #[cfg(feature = "rcs-kpa")]
        {
            let kpa = match self.variant {
                RcsVariant::Rcs256 => crate::kpa::Kpa::kpa256(&self.mac_key, b""),
                RcsVariant::Rcs512 => crate::kpa::Kpa::kpa512(&self.mac_key, b""),
            };
            return Mac::Kpa(kpa);
        }
        #[cfg(not(feature = "rcs-kpa"))]
        {
            let kmac = match self.variant {
                RcsVariant::Rcs256 => Kmac::kmac256(&self.mac_key, b""),
                RcsVariant::Rcs512 => Kmac::kmac512(&self.mac_key, b""),
            };
            Mac::Kmac(kmac)
        }
    }

    /// Starts a new nonce's worth of associated-data binding, resetting
    /// the phase machine. Call this once per nonce, before `seal`/`open`.
    pub fn start(&mut self) {
        self.mac = Some(self.new_mac());
        self.phase = CipherPhase::Created;
        self.processed = 0;
    }

    /// Binds associated data into the tag. Must be called at most once,
    /// before the first `seal`/`open` call for this nonce.
    pub fn set_associated(&mut self, ad: &[u8]) -> Result<()> {
        if self.phase != CipherPhase::Created {
            return Err(Error::AlreadyAssociatedAfterTransform);
        }
        let mac = self.mac.as_mut().ok_or(Error::AlreadyAssociatedAfterTransform)?;
        mac_associated_data(mac, ad);
        self.phase = CipherPhase::AssociatedData;
        Ok(())
    }

    fn ctr_transform(&self, counter: &mut [u8], input: &[u8], output: &mut [u8]) {
        let block_size = self.variant.block_size();
        let RoundKeys::TableBased(round_keys) = &self.round_keys;

        for (in_block, out_block) in input.chunks(block_size).zip(output.chunks_mut(block_size)) {
            let keystream = match self.backend {
                Backend::TableBased => {
                    tables::encrypt_block(counter, round_keys, self.variant.rounds(), self.variant.columns())
                }
                #[cfg(all(target_arch = "x86_64", feature = "aesni"))]
                Backend::AesNi => unsafe {
                    aesni::encrypt_block(counter, round_keys, self.variant.rounds(), self.variant.columns())
                },
            };
            for (o, (i, k)) in out_block.iter_mut().zip(in_block.iter().zip(keystream.iter())) {
                *o = i ^ k;
            }
            le_increment(counter);
        }
    }

    /// Encrypts `plaintext` into `ciphertext` under `counter` (the CTR
    /// nonce, advanced in place), then writes the authentication tag.
    /// `counter` must be `variant.block_size()` bytes.
    pub fn seal(&mut self, counter: &mut [u8], plaintext: &[u8], ciphertext: &mut [u8], tag: &mut [u8]) {
        self.processed += plaintext.len() as u64;
        self.mac
            .as_mut()
            .expect("start() must be called before seal()")
            .update(counter);

        self.ctr_transform(counter, plaintext, ciphertext);

        let mac = self.mac.as_mut().expect("start() must be called before seal()");
        mac.update(ciphertext);
        self.phase = CipherPhase::Transforming;

        let block_size = self.variant.block_size();
        let mut counter_buf = [0u8; 8];
        write_u64_le(&mut counter_buf, block_size as u64 + self.processed + 8);
        let mac = self.mac.as_mut().unwrap();
        mac.update(&counter_buf);

        let mac = self.mac.take().unwrap();
        mac.finalize(tag);
    }

    /// Decrypts `ciphertext` into `plaintext` under `counter`, verifying
    /// `tag` in constant time. Returns `false` (and leaves `plaintext`
    /// zeroed) on authentication failure, never releasing unauthenticated
    /// plaintext.
    pub fn open(&mut self, counter: &mut [u8], ciphertext: &[u8], plaintext: &mut [u8], tag: &[u8]) -> bool {
        self.processed += ciphertext.len() as u64;
        self.mac
            .as_mut()
            .expect("start() must be called before open()")
            .update(counter);

        let counter_snapshot_block_size = self.variant.block_size();
        let mut counter_for_decrypt = counter.to_vec();

        let mac = self.mac.as_mut().unwrap();
        mac.update(ciphertext);
        self.phase = CipherPhase::Transforming;

        let mut counter_buf = [0u8; 8];
        write_u64_le(&mut counter_buf, counter_snapshot_block_size as u64 + self.processed + 8);
        let mac = self.mac.as_mut().unwrap();
        mac.update(&counter_buf);

        let mac = self.mac.take().unwrap();
        let mut computed_tag = vec![0u8; tag.len()];
        mac.finalize(&mut computed_tag);

        let authentic = verify_tag(&computed_tag, tag);
        crate::aead::scrub_on_failure(&mut computed_tag, authentic);
        if authentic {
            self.ctr_transform(&mut counter_for_decrypt, ciphertext, plaintext);
            counter.copy_from_slice(&counter_for_decrypt);
        } else {
            plaintext.zeroize();
        }
        authentic
    }
}

fn le_increment(counter: &mut [u8]) {
    for byte in counter.iter_mut() {
        let (next, overflow) = byte.overflowing_add(1);
        *byte = next;
        if !overflow {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = [0x11u8; 32];
        let mut cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        cipher.start();
        cipher.set_associated(b"associated data").unwrap();

        let plaintext = b"the quick brown fox jumps over the lazy dog!!!!";
        let mut counter = [0u8; 32];
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; 32];
        cipher.seal(&mut counter, plaintext, &mut ciphertext, &mut tag);

        assert_ne!(&ciphertext[..], &plaintext[..]);

        let mut decrypt_cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        decrypt_cipher.start();
        decrypt_cipher.set_associated(b"associated data").unwrap();
        let mut decrypted = vec![0u8; plaintext.len()];
        let mut decrypt_counter = [0u8; 32];
        let authentic = decrypt_cipher.open(&mut decrypt_counter, &ciphertext, &mut decrypted, &tag);

        assert!(authentic);
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = [0x22u8; 32];
        let mut cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        cipher.start();
        cipher.set_associated(b"").unwrap();

        let plaintext = b"sixteen byte msg";
        let mut counter = [0u8; 32];
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; 32];
        cipher.seal(&mut counter, plaintext, &mut ciphertext, &mut tag);

        ciphertext[0] ^= 0x01;

        let mut decrypt_cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        decrypt_cipher.start();
        decrypt_cipher.set_associated(b"").unwrap();
        let mut decrypted = vec![0u8; plaintext.len()];
        let mut decrypt_counter = [0u8; 32];
        let authentic = decrypt_cipher.open(&mut decrypt_counter, &ciphertext, &mut decrypted, &tag);

        assert!(!authentic);
        assert_eq!(&decrypted[..], &[0u8; 16][..]);
    }

    #[test]
    fn wrong_key_rejected_at_construction() {
        let short_key = [0u8; 16];
        assert!(Rcs::new(RcsVariant::Rcs256, &short_key, b"").is_err());
    }

    #[test]
    fn zeroize_clears_round_keys_and_mac_key() {
        let key = [0x33u8; 32];
        let mut cipher = Rcs::new(RcsVariant::Rcs256, &key, b"").unwrap();
        assert!(!cipher.mac_key.iter().all(|&b| b == 0));
        let RoundKeys::TableBased(round_key_bytes) = &cipher.round_keys;
        assert!(!round_key_bytes.iter().all(|&b| b == 0));

        cipher.zeroize();

        assert!(cipher.mac_key.iter().all(|&b| b == 0));
        let RoundKeys::TableBased(round_key_bytes) = &cipher.round_keys;
        assert!(round_key_bytes.iter().all(|&b| b == 0));
    }
}
