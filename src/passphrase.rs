//! Passphrase entry.

use secrecy::zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Longest accepted passphrase, in bytes. Anything beyond is dropped.
pub const PASSPHRASE_MAX: usize = 1024;

/// Where passphrases come from.
///
/// The key-file logic only ever sees this trait; the binary wires in
/// [`Tty`], tests substitute a scripted source.
pub trait PassphraseSource {
    /// Display `prompt` and read one passphrase.
    ///
    /// # Errors
    ///
    /// Errors if the source is unavailable or cannot be read.
    fn read(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads from the controlling terminal with local echo disabled.
pub struct Tty;

impl PassphraseSource for Tty {
    fn read(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        let pass =
            rpassword::prompt_password(prompt).map_err(|e| Error::Passphrase(e.to_string()))?;
        let mut pass = Zeroizing::new(pass.into_bytes());
        pass.truncate(PASSPHRASE_MAX);
        Ok(pass)
    }
}
