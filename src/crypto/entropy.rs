//! OS entropy.

use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::zeroize::Zeroizing;

use crate::crypto;
use crate::error::{Error, Result};

/// Fill `buf` from the OS cryptographic RNG.
///
/// Nothing else is ever mixed in, and there is no reseeding: one call
/// produces one batch of fresh randomness or a fatal error.
pub fn fill(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Entropy(e.to_string()))
}

/// Generate a brand new, clamped Curve25519 secret scalar.
pub fn generate_secret() -> Result<Zeroizing<[u8; 32]>> {
    let mut secret = Zeroizing::new([0u8; 32]);
    fill(&mut *secret)?;
    crypto::clamp(&mut secret);
    Ok(secret)
}
