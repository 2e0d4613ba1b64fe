//! Memory-hard key derivation.
//!
//! A passphrase is stretched into a 32-byte protection key by filling
//! `1 << iexp` bytes of memory with a SHA-256 hash chain seeded from
//! HMAC-SHA256(salt, passphrase), then chasing `1 << (iexp - 5)`
//! data-dependent jumps through it. The random-access scan over the
//! whole buffer is the sole source of memory-hardness.

use hmac::Mac;
use secrecy::zeroize::Zeroizing;
use sha2::{Digest, Sha256};

use crate::crypto::HmacSha256;

pub const IEXP_MIN: u8 = 5;
pub const IEXP_MAX: u8 = 31;

const DIGEST_SIZE: usize = 32;
const BLOCK_SIZE: usize = 64;

/// Derive a 32-byte protection key from a passphrase.
///
/// The optional 8-byte salt occupies the start of a zeroed block-sized
/// HMAC key. Output is a pure function of `(passphrase, iexp, salt)`,
/// identical across platforms and runs.
///
/// # Panics
///
/// Panics if `iexp` is outside `5..=31`; callers validate user input
/// before it gets here.
#[must_use]
pub fn derive(passphrase: &[u8], iexp: u8, salt: Option<&[u8; 8]>) -> Zeroizing<[u8; 32]> {
    assert!(
        (IEXP_MIN..=IEXP_MAX).contains(&iexp),
        "iteration exponent out of range"
    );

    let memlen = 1_usize << iexp;
    let mask = memlen - 1;
    let iterations = 1_u64 << (iexp - 5);

    let mut salt_block = [0u8; BLOCK_SIZE];
    if let Some(salt) = salt {
        salt_block[..salt.len()].copy_from_slice(salt);
    }
    let mut seed = HmacSha256::new_from_slice(&salt_block).expect("HMAC accepts any key length");
    seed.update(passphrase);

    // The extra digest keeps every 32-byte read in bounds even when a
    // jump lands on an unaligned offset near the end.
    let mut memory = Zeroizing::new(vec![0u8; memlen + DIGEST_SIZE]);
    memory[..DIGEST_SIZE].copy_from_slice(&seed.finalize().into_bytes());
    for i in (DIGEST_SIZE..=memlen).step_by(DIGEST_SIZE) {
        let digest = Sha256::digest(&memory[i - DIGEST_SIZE..i]);
        memory[i..i + DIGEST_SIZE].copy_from_slice(&digest);
    }

    let mut p = memlen;
    for _ in 0..iterations {
        let digest = Sha256::digest(&memory[p..p + DIGEST_SIZE]);
        memory[p..p + DIGEST_SIZE].copy_from_slice(&digest);

        // The jump offset is read only after the hash has overwritten it.
        let mut word = [0u8; 4];
        word.copy_from_slice(&memory[p..p + 4]);
        p = u32::from_le_bytes(word) as usize & mask;
    }

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&memory[p..p + DIGEST_SIZE]);
    key
}
