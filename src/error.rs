use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Keygen double-prompt produced two different passphrases.
    PassphrasesDontMatch,
    /// ProtectHash check failed for a prompted passphrase.
    WrongPassphrase,
    /// Secret-key file was written by an incompatible build.
    SecKeyVersion { expected: u8, found: u8 },
    /// Secret-key file is the wrong size or carries impossible fields.
    MalformedSecKey,
    /// The archive IV does not match the derived shared secret.
    InvalidMasterKey,
    /// The trailing MAC does not cover the decrypted stream.
    ChecksumMismatch,
    /// Input ended before the trailing MAC could even exist.
    CiphertextTooShort,
    /// The OS random source failed or came up short.
    Entropy(String),
    /// The controlling terminal could not be read.
    Passphrase(String),
    /// Refusing to overwrite an existing key file without `--force`.
    Clobber(PathBuf),
    Read(String),
    Write(String),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassphrasesDontMatch => write!(f, "passphrases don't match"),
            Self::WrongPassphrase => write!(f, "wrong passphrase"),
            Self::SecKeyVersion { expected, found } => write!(
                f,
                "secret key version mismatch -- expected {expected}, got {found}"
            ),
            Self::MalformedSecKey => write!(f, "malformed secret key file"),
            Self::InvalidMasterKey => write!(f, "invalid master key or format"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch!"),
            Self::CiphertextTooShort => write!(f, "ciphertext file too short"),
            Self::Entropy(reason) => write!(f, "failed to gather entropy -- {reason}"),
            Self::Passphrase(reason) => write!(f, "could not read passphrase -- {reason}"),
            Self::Clobber(path) => write!(f, "operation would clobber {}", path.display()),
            Self::Read(reason) | Self::Write(reason) | Self::Other(reason) => {
                write!(f, "{reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Print a non-fatal warning on stderr.
///
/// Warnings never alter the exit status; they exist for degraded paths
/// like a skipped key agent.
pub fn warning(message: &str) {
    eprintln!("warning: {message}");
}
