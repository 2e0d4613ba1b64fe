//! Authenticated stream codec.
//!
//! Ciphertext is the plaintext XORed with a ChaCha20 keystream, followed
//! by a 32-byte HMAC-SHA256 computed over the *plaintext*. Decryption
//! keeps the trailing 32 bytes of input resident at all times: they are
//! either the tag, or ciphertext that cannot be released until more
//! input proves it is not the tag.

use std::io::{self, Read, Write};

use chacha20::cipher::{NewCipher, StreamCipher};
use chacha20::{Key, LegacyNonce};
use hmac::Mac;

use crate::crypto::{self, ChaCha};
use crate::error::{Error, Result};

/// Plaintext is processed in chunks of this size; the format does not
/// depend on chunk boundaries.
const CHUNK_SIZE: usize = 64 * 1024;

const MAC_SIZE: usize = 32;

/// Read until `buf` is full or the reader is exhausted.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt `input` into `output`, appending the MAC after EOF.
pub fn encrypt(
    input: &mut dyn Read,
    output: &mut dyn Write,
    key: &[u8; 32],
    iv: &[u8; 8],
) -> Result<()> {
    let mut cipher = ChaCha::new(Key::from_slice(key), LegacyNonce::from_slice(iv));
    let mut mac = crypto::hmac(key);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_full(input, &mut buffer)
            .map_err(|e| Error::Read(format!("error reading plaintext file -- {e}")))?;
        if n == 0 {
            break;
        }
        mac.update(&buffer[..n]);
        cipher.apply_keystream(&mut buffer[..n]);
        output
            .write_all(&buffer[..n])
            .map_err(|e| Error::Write(format!("error writing ciphertext file -- {e}")))?;
        if n < buffer.len() {
            break;
        }
    }

    output
        .write_all(&mac.finalize().into_bytes())
        .map_err(|e| Error::Write(format!("error writing checksum to ciphertext file -- {e}")))?;
    Ok(())
}

/// Decrypt `input` into `output`, verifying the trailing MAC last.
///
/// No plaintext is ever produced from bytes that might still turn out to
/// be the tag.
pub fn decrypt(
    input: &mut dyn Read,
    output: &mut dyn Write,
    key: &[u8; 32],
    iv: &[u8; 8],
) -> Result<()> {
    let mut cipher = ChaCha::new(Key::from_slice(key), LegacyNonce::from_slice(iv));
    let mut mac = crypto::hmac(key);
    let mut buffer = vec![0u8; MAC_SIZE + CHUNK_SIZE];

    let n = read_full(input, &mut buffer[..MAC_SIZE])
        .map_err(|e| Error::Read(format!("cannot read ciphertext file -- {e}")))?;
    if n != MAC_SIZE {
        return Err(Error::CiphertextTooShort);
    }

    loop {
        let z = read_full(input, &mut buffer[MAC_SIZE..])
            .map_err(|e| Error::Read(format!("error reading ciphertext file -- {e}")))?;
        if z == 0 {
            break;
        }
        // `z` new bytes arrived, so the leading `z` bytes of the buffer
        // are now known not to be the tag. Release them.
        cipher.apply_keystream(&mut buffer[..z]);
        mac.update(&buffer[..z]);
        output
            .write_all(&buffer[..z])
            .map_err(|e| Error::Write(format!("error writing plaintext file -- {e}")))?;

        // Slide the candidate tag back to the front.
        buffer.copy_within(z..z + MAC_SIZE, 0);

        if z < CHUNK_SIZE {
            break;
        }
    }

    mac.verify_slice(&buffer[..MAC_SIZE])
        .map_err(|_| Error::ChecksumMismatch)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const KEY: &[u8; 32] = b"an arbitrary 32-byte chacha key!";
    const IV: &[u8; 8] = b"nonce--8";

    fn encrypt_vec(plaintext: &[u8]) -> Vec<u8> {
        let mut encrypted = Vec::new();
        encrypt(&mut Cursor::new(plaintext), &mut encrypted, KEY, IV).unwrap();
        encrypted
    }

    fn decrypt_vec(ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut decrypted = Vec::new();
        decrypt(&mut Cursor::new(ciphertext), &mut decrypted, KEY, IV)?;
        Ok(decrypted)
    }

    #[test]
    fn roundtrip_small_input() {
        let encrypted = encrypt_vec(b"hello, world!");
        assert_eq!(encrypted.len(), 13 + MAC_SIZE);
        assert_eq!(decrypt_vec(&encrypted).unwrap(), b"hello, world!");
    }

    #[test]
    fn roundtrip_empty_input() {
        let encrypted = encrypt_vec(b"");
        assert_eq!(encrypted.len(), MAC_SIZE);
        assert_eq!(decrypt_vec(&encrypted).unwrap(), b"");
    }

    #[test]
    fn roundtrip_exactly_one_chunk() {
        let plaintext = vec![0xAB_u8; CHUNK_SIZE];
        let encrypted = encrypt_vec(&plaintext);
        assert_eq!(decrypt_vec(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_one_chunk_plus_one_byte() {
        let plaintext = vec![0xCD_u8; CHUNK_SIZE + 1];
        let encrypted = encrypt_vec(&plaintext);
        assert_eq!(decrypt_vec(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_multiple_chunks() {
        let plaintext: Vec<u8> = (0..3 * CHUNK_SIZE + 12345).map(|i| i as u8).collect();
        let encrypted = encrypt_vec(&plaintext);
        assert_eq!(decrypt_vec(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_awkward_tail_lengths() {
        // Lengths whose remainder modulo the chunk size falls within the
        // resident window are the delicate ones.
        for tail in [1, 16, 31, 32, 33] {
            let plaintext = vec![0x5A_u8; CHUNK_SIZE + tail];
            let encrypted = encrypt_vec(&plaintext);
            assert_eq!(decrypt_vec(&encrypted).unwrap(), plaintext, "tail = {tail}");
        }
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let plaintext = b"some recognizable bytes";
        let encrypted = encrypt_vec(plaintext);
        assert_ne!(&encrypted[..plaintext.len()], plaintext.as_slice());
    }

    #[test]
    fn decrypt_rejects_input_shorter_than_the_tag() {
        assert_eq!(decrypt_vec(&[0u8; 31]), Err(Error::CiphertextTooShort));
        assert_eq!(decrypt_vec(b""), Err(Error::CiphertextTooShort));
    }

    #[test]
    fn decrypt_rejects_flipped_ciphertext_bit() {
        let mut encrypted = encrypt_vec(&vec![7u8; 4096]);
        encrypted[1000] ^= 1;
        assert_eq!(decrypt_vec(&encrypted), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn decrypt_rejects_flipped_tag_bit() {
        let mut encrypted = encrypt_vec(b"hello");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x80;
        assert_eq!(decrypt_vec(&encrypted), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn decrypt_rejects_truncation() {
        let encrypted = encrypt_vec(&vec![7u8; 4096]);
        let truncated = &encrypted[..encrypted.len() - 16];
        assert_eq!(decrypt_vec(truncated), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let encrypted = encrypt_vec(b"hello");
        let mut other_key = *KEY;
        other_key[0] ^= 1;
        let mut decrypted = Vec::new();
        let result = decrypt(
            &mut Cursor::new(encrypted),
            &mut decrypted,
            &other_key,
            IV,
        );
        assert_eq!(result, Err(Error::ChecksumMismatch));
    }

    #[test]
    fn decrypt_rejects_wrong_iv() {
        let encrypted = encrypt_vec(b"hello");
        let mut decrypted = Vec::new();
        let result = decrypt(
            &mut Cursor::new(encrypted),
            &mut decrypted,
            KEY,
            b"other--8",
        );
        assert_eq!(result, Err(Error::ChecksumMismatch));
    }
}
