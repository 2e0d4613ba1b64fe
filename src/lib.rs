//! Personal file-archive encryption.
//!
//! Files are encrypted to a long-term Curve25519 key pair: `archive`
//! performs an ephemeral-static Diffie-Hellman agreement with the public
//! key and streams the file through ChaCha20 with a trailing HMAC-SHA256;
//! `extract` recomputes the shared secret from the secret key and undoes
//! it. The secret key lives in a small versioned container, optionally
//! encrypted under a passphrase-derived key, and a forked key agent can
//! cache that protection key between invocations.
//!
//! # Caveat
//!
//! The archive format authenticates the *plaintext* with a MAC appended
//! after the ciphertext. Extraction therefore writes plaintext out before
//! the final verification completes; on a checksum mismatch the tool
//! exits nonzero and unlinks the output, but consumers must not trust the
//! output file until the process has exited successfully. The format is
//! kept as-is for compatibility with existing archives.

pub mod agent;
pub mod cleanup;
pub mod crypto;
pub mod error;
pub mod keyfile;
pub mod passphrase;
pub mod paths;

pub use error::{Error, Result};
