//! Key files: the 64-byte secret-key container and the raw public key.
//!
//! The secret scalar is stored alongside an 8-byte IV (doubling as the
//! KDF salt), the KDF iteration exponent, the format version, and a
//! truncated hash of the protection key used to tell a wrong passphrase
//! from a corrupt archive. When protected, the scalar slot is XORed
//! with a ChaCha20 keystream under the protection key.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chacha20::cipher::{NewCipher, StreamCipher};
use chacha20::{Key, LegacyNonce};
use secrecy::zeroize::Zeroizing;

use crate::agent;
use crate::cleanup::OutputFile;
use crate::crypto::envelope::FORMAT_VERSION;
use crate::crypto::{self, ChaCha, entropy, kdf};
use crate::error::{Error, Result};
use crate::passphrase::PassphraseSource;

/// Byte offsets inside the secret-key file.
const SECFILE_IV: usize = 0;
const SECFILE_ITERATIONS: usize = 8;
const SECFILE_VERSION: usize = 9;
const SECFILE_PROTECT_HASH: usize = 12;
const SECFILE_SECKEY: usize = 32;

pub const SECFILE_SIZE: usize = 64;

/// Stored bytes of SHA-256(ProtectionKey); enough to verify a
/// passphrase, not a commitment to anything.
const PROTECT_HASH_SIZE: usize = 20;

const IV_SIZE: usize = 8;

/// Dump the public key to a file.
///
/// The handle is returned uncommitted so a later failure in the same
/// operation still removes it.
///
/// # Errors
///
/// Errors if the file cannot be created or written.
pub fn write_pubkey(path: &Path, key: &[u8; 32]) -> Result<OutputFile> {
    let mut out = OutputFile::create(path).map_err(|e| {
        Error::Write(format!(
            "failed to open key file for writing '{}' -- {e}",
            path.display()
        ))
    })?;
    out.write_all(key)
        .map_err(|e| Error::Write(format!("failed to write key file '{}' -- {e}", path.display())))?;
    Ok(out)
}

/// Load the public key from a file.
///
/// # Errors
///
/// Errors if the file cannot be opened or is shorter than a key.
pub fn load_pubkey(path: &Path) -> Result<[u8; 32]> {
    let mut file = File::open(path).map_err(|e| {
        Error::Read(format!(
            "failed to open key file for reading '{}' -- {e}",
            path.display()
        ))
    })?;
    let mut key = [0u8; 32];
    file.read_exact(&mut key)
        .map_err(|e| Error::Read(format!("failed to read key file '{}' -- {e}", path.display())))?;
    Ok(key)
}

/// Write the secret key to a file, encrypting it if requested.
///
/// A nonzero `iexp` prompts twice for a passphrase; an empty first
/// answer silently downgrades to an unprotected file. The handle is
/// returned uncommitted.
///
/// # Errors
///
/// Errors on mismatched passphrases, entropy failure, or file I/O.
pub fn write_seckey(
    path: &Path,
    secret: &[u8; 32],
    iexp: u8,
    passphrase: &mut dyn PassphraseSource,
) -> Result<OutputFile> {
    let mut buf = Zeroizing::new([0u8; SECFILE_SIZE]);
    buf[SECFILE_VERSION] = FORMAT_VERSION;

    let mut protect: Option<Zeroizing<[u8; 32]>> = None;

    if iexp != 0 {
        let first = passphrase.read("passphrase (empty for none): ")?;
        if !first.is_empty() {
            let second = passphrase.read("passphrase (repeat): ")?;
            if *first != *second {
                return Err(Error::PassphrasesDontMatch);
            }

            // The IV doubles as the KDF salt.
            let mut iv = [0u8; IV_SIZE];
            entropy::fill(&mut iv)?;
            buf[SECFILE_IV..SECFILE_IV + IV_SIZE].copy_from_slice(&iv);
            buf[SECFILE_ITERATIONS] = iexp;

            let key = kdf::derive(&first, iexp, Some(&iv));
            let hash = crypto::sha256(&*key);
            buf[SECFILE_PROTECT_HASH..SECFILE_PROTECT_HASH + PROTECT_HASH_SIZE]
                .copy_from_slice(&hash[..PROTECT_HASH_SIZE]);
            protect = Some(key);
        }
    }

    buf[SECFILE_SECKEY..].copy_from_slice(secret);
    if let Some(key) = protect {
        let iv = LegacyNonce::from_slice(&buf[SECFILE_IV..SECFILE_IV + IV_SIZE]).to_owned();
        let mut cipher = ChaCha::new(Key::from_slice(&*key), &iv);
        cipher.apply_keystream(&mut buf[SECFILE_SECKEY..]);
    }

    let mut out = OutputFile::create(path).map_err(|e| {
        Error::Write(format!(
            "failed to open key file for writing '{}' -- {e}",
            path.display()
        ))
    })?;
    out.write_all(&*buf)
        .map_err(|e| Error::Write(format!("failed to write key file '{}' -- {e}", path.display())))?;
    Ok(out)
}

/// Load and, if needed, decrypt the secret key stored in a file.
///
/// For a protected key the agent is consulted first, keyed by the
/// file's IV; a served key only counts when it matches the stored
/// ProtectHash. Otherwise the user is prompted once. When the
/// passphrase (not the agent) supplied the key and `agent_timeout` is
/// nonzero, a fresh agent is spawned for subsequent invocations.
///
/// # Errors
///
/// Errors on I/O failure, a version or format mismatch, or a wrong
/// passphrase.
pub fn load_seckey(
    path: &Path,
    passphrase: &mut dyn PassphraseSource,
    agent_timeout: u32,
) -> Result<Zeroizing<[u8; 32]>> {
    let mut file = File::open(path).map_err(|e| {
        Error::Read(format!(
            "failed to open key file for reading '{}' -- {e}",
            path.display()
        ))
    })?;
    let mut buf = Zeroizing::new([0u8; SECFILE_SIZE]);
    file.read_exact(&mut *buf)
        .map_err(|e| Error::Read(format!("failed to read key file '{}' -- {e}", path.display())))?;

    let version = buf[SECFILE_VERSION];
    if version != FORMAT_VERSION {
        return Err(Error::SecKeyVersion {
            expected: FORMAT_VERSION,
            found: version,
        });
    }

    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&buf[SECFILE_SECKEY..]);

    let iexp = buf[SECFILE_ITERATIONS];
    if iexp == 0 {
        return Ok(secret);
    }
    if !(kdf::IEXP_MIN..=kdf::IEXP_MAX).contains(&iexp) {
        return Err(Error::MalformedSecKey);
    }

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&buf[SECFILE_IV..SECFILE_IV + IV_SIZE]);
    let stored_hash = &buf[SECFILE_PROTECT_HASH..SECFILE_PROTECT_HASH + PROTECT_HASH_SIZE];

    let agent_key =
        agent::try_read(&iv).filter(|key| crypto::sha256(&**key)[..PROTECT_HASH_SIZE] == *stored_hash);
    let from_agent = agent_key.is_some();

    let protect = match agent_key {
        Some(key) => key,
        None => {
            let pass = passphrase.read("passphrase: ")?;
            let key = kdf::derive(&pass, iexp, Some(&iv));
            if crypto::sha256(&*key)[..PROTECT_HASH_SIZE] != *stored_hash {
                return Err(Error::WrongPassphrase);
            }
            key
        }
    };

    if !from_agent && agent_timeout > 0 {
        agent::spawn(&protect, &iv, agent_timeout);
    }

    let mut cipher = ChaCha::new(Key::from_slice(&*protect), LegacyNonce::from_slice(&iv));
    cipher.apply_keystream(&mut *secret);
    Ok(secret)
}

/// Render a short human-readable fingerprint of a public key.
#[must_use]
pub fn fingerprint(key: &[u8; 32]) -> String {
    let hash = crypto::sha256(key);
    let words: Vec<String> = hash[..16]
        .chunks_exact(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word.copy_from_slice(chunk);
            format!("{:08x}", u32::from_be_bytes(word))
        })
        .collect();
    words.join("-")
}
