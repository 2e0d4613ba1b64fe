//! Ephemeral-static envelope around the stream codec.
//!
//! Every archive gets a fresh ephemeral key pair; the shared secret
//! between the ephemeral scalar and the recipient's long-term point
//! keys the codec. Hashing the shared secret yields the 8-byte IV, with
//! the format version folded into its first byte so that archives are
//! bound to the format that produced them.

use std::io::{Read, Write};

use secrecy::zeroize::Zeroizing;

use crate::crypto::{self, entropy, stream};
use crate::error::{Error, Result};

/// Version byte folded into the archive IV and stored in key files.
/// Bumping it invalidates every existing archive and key file.
pub const FORMAT_VERSION: u8 = 2;

/// IV plus ephemeral public point.
pub const HEADER_SIZE: usize = 8 + 32;

/// Derive the 8-byte archive IV from a shared secret.
fn derive_iv(shared: &[u8; 32]) -> [u8; 8] {
    let digest = crypto::sha256(shared);
    let mut iv = [0u8; 8];
    iv.copy_from_slice(&digest[..8]);
    iv[0] = iv[0].wrapping_add(FORMAT_VERSION);
    iv
}

/// Encrypt `input` into `output` for the holder of `public`.
pub fn archive(input: &mut dyn Read, output: &mut dyn Write, public: &[u8; 32]) -> Result<()> {
    let esecret = entropy::generate_secret()?;
    let epublic = crypto::compute_public(&esecret);
    let shared = Zeroizing::new(crypto::compute_shared(&esecret, public));

    let iv = derive_iv(&shared);
    output
        .write_all(&iv)
        .map_err(|e| Error::Write(format!("failed to write IV to archive -- {e}")))?;
    output
        .write_all(&epublic)
        .map_err(|e| Error::Write(format!("failed to write ephemeral key to archive -- {e}")))?;

    stream::encrypt(input, output, &shared, &iv)
}

/// Decrypt `input` into `output` with the long-term secret scalar.
pub fn extract(input: &mut dyn Read, output: &mut dyn Write, secret: &[u8; 32]) -> Result<()> {
    let mut iv = [0u8; 8];
    input
        .read_exact(&mut iv)
        .map_err(|e| Error::Read(format!("failed to read IV from archive -- {e}")))?;
    let mut epublic = [0u8; 32];
    input
        .read_exact(&mut epublic)
        .map_err(|e| Error::Read(format!("failed to read ephemeral key from archive -- {e}")))?;

    let shared = Zeroizing::new(crypto::compute_shared(secret, &epublic));

    // Cheap pre-authentication: both sides must agree on the key
    // material and the format version before any plaintext is produced.
    if iv != derive_iv(&shared) {
        return Err(Error::InvalidMasterKey);
    }

    stream::decrypt(input, output, &shared, &iv)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn keypair() -> (Zeroizing<[u8; 32]>, [u8; 32]) {
        let secret = entropy::generate_secret().unwrap();
        let public = crypto::compute_public(&secret);
        (secret, public)
    }

    fn archive_vec(plaintext: &[u8], public: &[u8; 32]) -> Vec<u8> {
        let mut archived = Vec::new();
        archive(&mut Cursor::new(plaintext), &mut archived, public).unwrap();
        archived
    }

    fn extract_vec(archived: &[u8], secret: &[u8; 32]) -> Result<Vec<u8>> {
        let mut extracted = Vec::new();
        extract(&mut Cursor::new(archived), &mut extracted, secret)?;
        Ok(extracted)
    }

    #[test]
    fn roundtrip() {
        let (secret, public) = keypair();
        let archived = archive_vec(b"hello world", &public);
        assert_eq!(extract_vec(&archived, &secret).unwrap(), b"hello world");
    }

    #[test]
    fn archive_size_is_header_plus_body_plus_mac() {
        let (_, public) = keypair();
        let archived = archive_vec(b"hello world", &public);
        assert_eq!(archived.len(), HEADER_SIZE + 11 + 32);
    }

    #[test]
    fn archives_of_the_same_plaintext_differ() {
        // Fresh ephemeral keys every time.
        let (_, public) = keypair();
        assert_ne!(archive_vec(b"same", &public), archive_vec(b"same", &public));
    }

    #[test]
    fn extract_with_wrong_key_fails_before_any_output() {
        let (_, public) = keypair();
        let (other_secret, other_public) = keypair();
        assert_ne!(public, other_public);

        let archived = archive_vec(b"hello world", &public);
        let mut extracted = Vec::new();
        let result = extract(
            &mut Cursor::new(archived),
            &mut extracted,
            &other_secret,
        );
        assert_eq!(result, Err(Error::InvalidMasterKey));
        assert!(extracted.is_empty());
    }

    #[test]
    fn extract_rejects_flipped_iv_bit() {
        let (secret, public) = keypair();
        let mut archived = archive_vec(b"hello world", &public);
        archived[3] ^= 1;
        assert_eq!(extract_vec(&archived, &secret), Err(Error::InvalidMasterKey));
    }

    #[test]
    fn extract_rejects_flipped_ephemeral_key_bit() {
        let (secret, public) = keypair();
        let mut archived = archive_vec(b"hello world", &public);
        archived[8] ^= 1;
        assert_eq!(extract_vec(&archived, &secret), Err(Error::InvalidMasterKey));
    }

    #[test]
    fn extract_rejects_flipped_ciphertext_bit() {
        let (secret, public) = keypair();
        let mut archived = archive_vec(&vec![0u8; 4096], &public);
        archived[HEADER_SIZE + 100] ^= 1;
        assert_eq!(extract_vec(&archived, &secret), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn extract_rejects_other_format_version() {
        // A different version shifts the first IV byte, which reads as
        // a key mismatch.
        let (secret, public) = keypair();
        let mut archived = archive_vec(b"hello world", &public);
        archived[0] = archived[0].wrapping_add(1);
        assert_eq!(extract_vec(&archived, &secret), Err(Error::InvalidMasterKey));
    }

    #[test]
    fn extract_rejects_truncated_header() {
        let (secret, _) = keypair();
        let result = extract_vec(&[0u8; 12], &secret);
        assert!(matches!(result, Err(Error::Read(_))));
    }
}
