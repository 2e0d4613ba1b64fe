//! Cryptographic core: thin primitive wrappers plus the entropy source,
//! the memory-hard KDF, the stream codec, and the envelope protocol.

pub mod entropy;
pub mod envelope;
pub mod kdf;
pub mod stream;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use x25519_dalek::{X25519_BASEPOINT_BYTES, x25519};

/// ChaCha20 with the original 64-bit nonce; the counter starts at zero.
pub type ChaCha = chacha20::ChaCha20Legacy;

pub type HmacSha256 = Hmac<Sha256>;

/// One-shot SHA-256.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA256 keyed with exactly 32 bytes.
///
/// The key is zero-padded to the 64-byte hash block and XORed with the
/// classical `0x36`/`0x5c` pads; anything other than a 32-byte key is
/// unrepresentable at this boundary.
#[must_use]
pub fn hmac(key: &[u8; 32]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts any key length")
}

/// Force a scalar into the valid Curve25519 private-key subgroup.
pub fn clamp(scalar: &mut [u8; 32]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}

/// Compute the public point for a secret scalar.
#[must_use]
pub fn compute_public(secret: &[u8; 32]) -> [u8; 32] {
    x25519(*secret, X25519_BASEPOINT_BYTES)
}

/// Compute the shared secret between our scalar and their point.
#[must_use]
pub fn compute_shared(secret: &[u8; 32], public: &[u8; 32]) -> [u8; 32] {
    x25519(*secret, *public)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty_input() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_abc() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn clamp_sets_and_clears_the_right_bits() {
        let mut scalar = [0xFF_u8; 32];
        clamp(&mut scalar);
        assert_eq!(scalar[0] & 7, 0);
        assert_eq!(scalar[31] & 0xC0, 0x40);

        let mut scalar = [0_u8; 32];
        clamp(&mut scalar);
        assert_eq!(scalar[0], 0);
        assert_eq!(scalar[31], 0x40);
    }

    #[test]
    fn compute_public_matches_rfc7748_vector() {
        // RFC 7748 §6.1, Alice's key pair.
        let mut secret = [0u8; 32];
        hex::decode_to_slice(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
            &mut secret,
        )
        .unwrap();
        assert_eq!(
            hex::encode(compute_public(&secret)),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
    }

    #[test]
    fn compute_shared_matches_rfc7748_vector() {
        // RFC 7748 §6.1, Alice's secret against Bob's public point.
        let mut secret = [0u8; 32];
        hex::decode_to_slice(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
            &mut secret,
        )
        .unwrap();
        let mut public = [0u8; 32];
        hex::decode_to_slice(
            "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f",
            &mut public,
        )
        .unwrap();
        assert_eq!(
            hex::encode(compute_shared(&secret, &public)),
            "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742"
        );
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let mut a = *b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let mut b = *b"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        clamp(&mut a);
        clamp(&mut b);
        let shared_ab = compute_shared(&a, &compute_public(&b));
        let shared_ba = compute_shared(&b, &compute_public(&a));
        assert_eq!(shared_ab, shared_ba);
    }
}
