pub mod cli;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use secrecy::zeroize::Zeroizing;

use enchive::cleanup::OutputFile;
use enchive::crypto::{self, entropy, envelope, kdf};
use enchive::error::{Error, Result};
use enchive::keyfile;
use enchive::passphrase::{self, PassphraseSource};
use enchive::paths;

/// Appended to the input name when no output name is given.
const ARCHIVE_SUFFIX: &str = ".enchive";

fn pubfile_path(args: &cli::Args) -> Result<PathBuf> {
    match &args.pubkey {
        Some(path) => Ok(path.clone()),
        None => paths::default_pubfile(),
    }
}

fn secfile_path(args: &cli::Args) -> Result<PathBuf> {
    match &args.seckey {
        Some(path) => Ok(path.clone()),
        None => paths::default_secfile(),
    }
}

fn open_input(infile: Option<&Path>) -> Result<Box<dyn Read>> {
    Ok(match infile {
        Some(path) => Box::new(File::open(path).map_err(|e| {
            Error::Read(format!(
                "could not open input file '{}' -- {e}",
                path.display()
            ))
        })?),
        None => Box::new(io::stdin()),
    })
}

fn remove_input(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| {
        Error::Write(format!(
            "could not delete input file '{}' -- {e}",
            path.display()
        ))
    })
}

/// Create a key pair and write both key files.
pub fn keygen(args: &cli::Args, opts: &cli::KeygenArgs) -> Result<()> {
    let pubfile = pubfile_path(args)?;
    let secfile = secfile_path(args)?;

    if !opts.edit && !opts.force {
        if pubfile.exists() {
            return Err(Error::Clobber(pubfile));
        }
        if secfile.exists() {
            return Err(Error::Clobber(secfile));
        }
    }

    let mut tty = passphrase::Tty;

    let secret: Zeroizing<[u8; 32]> = if opts.edit {
        if !secfile.exists() {
            return Err(Error::Read(format!(
                "cannot edit non-existing file {}",
                secfile.display()
            )));
        }
        keyfile::load_seckey(&secfile, &mut tty, args.agent_timeout)?
    } else if let Some(iexp) = opts.derive {
        // Reproducible secret key from a passphrase alone.
        let first = tty.read("secret key passphrase: ")?;
        let second = tty.read("secret key passphrase (repeat): ")?;
        if *first != *second {
            return Err(Error::PassphrasesDontMatch);
        }
        let mut secret = kdf::derive(&first, iexp, None);
        crypto::clamp(&mut secret);
        secret
    } else {
        entropy::generate_secret()?
    };

    let public = crypto::compute_public(&secret);

    if opts.fingerprint {
        println!("keyid: {}", keyfile::fingerprint(&public));
    }

    // Neither file survives unless both get written.
    let iexp = if opts.plain { 0 } else { opts.iterations };
    let sec_out = keyfile::write_seckey(&secfile, &secret, iexp, &mut tty)?;
    let pub_out = keyfile::write_pubkey(&pubfile, &public)?;
    sec_out.commit();
    pub_out.commit();

    Ok(())
}

/// Print the public key fingerprint.
pub fn fingerprint(args: &cli::Args) -> Result<()> {
    let pubfile = pubfile_path(args)?;
    let public = keyfile::load_pubkey(&pubfile)?;
    println!("{}", keyfile::fingerprint(&public));
    Ok(())
}

/// Encrypt a file (or stdin) to the public key.
pub fn archive(args: &cli::Args, opts: &cli::FileArgs) -> Result<()> {
    let pubfile = pubfile_path(args)?;
    let public = keyfile::load_pubkey(&pubfile)?;

    let mut input = open_input(opts.infile.as_deref())?;

    let outfile: Option<PathBuf> = match (&opts.outfile, &opts.infile) {
        (Some(outfile), _) => Some(outfile.clone()),
        (None, Some(infile)) => {
            let mut name = infile.clone().into_os_string();
            name.push(ARCHIVE_SUFFIX);
            Some(PathBuf::from(name))
        }
        (None, None) => None,
    };

    match outfile {
        Some(path) => {
            let mut out = OutputFile::create(&path).map_err(|e| {
                Error::Write(format!(
                    "could not open output file '{}' -- {e}",
                    path.display()
                ))
            })?;
            envelope::archive(&mut input, &mut out, &public)?;
            out.commit();
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            envelope::archive(&mut input, &mut out, &public)?;
            out.flush()
                .map_err(|e| Error::Write(format!("error writing ciphertext file -- {e}")))?;
        }
    }

    if opts.delete {
        if let Some(infile) = &opts.infile {
            drop(input);
            remove_input(infile)?;
        }
    }

    Ok(())
}

/// Decrypt an archive (or stdin) with the secret key.
pub fn extract(args: &cli::Args, opts: &cli::FileArgs) -> Result<()> {
    let secfile = secfile_path(args)?;
    let mut tty = passphrase::Tty;
    let secret = keyfile::load_seckey(&secfile, &mut tty, args.agent_timeout)?;

    let mut input = open_input(opts.infile.as_deref())?;

    let outfile: Option<PathBuf> = match (&opts.outfile, &opts.infile) {
        (Some(outfile), _) => Some(outfile.clone()),
        (None, Some(infile)) => {
            let name = infile.to_str().and_then(|name| {
                name.strip_suffix(ARCHIVE_SUFFIX)
                    .filter(|stripped| !stripped.is_empty())
            });
            let Some(name) = name else {
                return Err(Error::Read(format!(
                    "could not determine output filename from {}",
                    infile.display()
                )));
            };
            Some(PathBuf::from(name))
        }
        (None, None) => None,
    };

    match outfile {
        Some(path) => {
            let mut out = OutputFile::create(&path).map_err(|e| {
                Error::Write(format!(
                    "could not open output file '{}' -- {e}",
                    path.display()
                ))
            })?;
            envelope::extract(&mut input, &mut out, &secret)?;
            out.commit();
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            envelope::extract(&mut input, &mut out, &secret)?;
            out.flush()
                .map_err(|e| Error::Write(format!("error writing plaintext file -- {e}")))?;
        }
    }

    if opts.delete {
        if let Some(infile) = &opts.infile {
            drop(input);
            remove_input(infile)?;
        }
    }

    Ok(())
}
