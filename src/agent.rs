//! Key agent.
//!
//! A short-lived background process that caches the passphrase-derived
//! protection key and serves it over a unix-domain socket named after
//! the key-file IV, under the runtime directory. The agent is an
//! availability optimization only: callers always validate a served key
//! against the stored ProtectHash, so it is never trusted for
//! integrity, and decryption works identically without it.
//!
//! On platforms without unix sockets both operations degrade to no-ops.

use secrecy::zeroize::Zeroizing;

#[cfg(unix)]
use std::env;
#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use std::os::fd::AsRawFd;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::process;

#[cfg(unix)]
use nix::poll::{PollFd, PollFlags, poll};

#[cfg(unix)]
use crate::error::warning;

/// Longest socket path `sockaddr_un` can carry.
#[cfg(unix)]
const SUN_PATH_MAX: usize = 108;

/// Rendezvous socket path for an IV.
///
/// The first defined of `$XDG_RUNTIME_DIR`, `$TMPDIR`, `/tmp`, joined
/// with the IV in hex. `None` (with a warning) when the directory
/// pushes the path past the `sockaddr_un` limit.
#[cfg(unix)]
fn rendezvous_path(iv: &[u8; 8]) -> Option<PathBuf> {
    let dir = env::var_os("XDG_RUNTIME_DIR")
        .or_else(|| env::var_os("TMPDIR"))
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);

    if dir.as_os_str().len() + 1 + 2 * iv.len() + 1 > SUN_PATH_MAX {
        warning(&format!("agent socket path too long -- {}", dir.display()));
        return None;
    }
    Some(dir.join(hex::encode(iv)))
}

/// Ask a running agent for the 32-byte protection key.
///
/// Any connect or read failure means "no key"; the caller falls back to
/// prompting.
#[cfg(unix)]
#[must_use]
pub fn try_read(iv: &[u8; 8]) -> Option<Zeroizing<[u8; 32]>> {
    let path = rendezvous_path(iv)?;
    let mut stream = UnixStream::connect(path).ok()?;
    let mut key = Zeroizing::new([0u8; 32]);
    stream.read_exact(&mut *key).ok()?;
    Some(key)
}

#[cfg(not(unix))]
#[must_use]
pub fn try_read(_iv: &[u8; 8]) -> Option<Zeroizing<[u8; 32]>> {
    None
}

/// Fork a detached agent serving `key` until `timeout_secs` of idleness.
///
/// The parent returns immediately; failures to start degrade to
/// warnings, never errors.
#[cfg(unix)]
pub fn spawn(key: &[u8; 32], iv: &[u8; 8], timeout_secs: u32) -> bool {
    use nix::unistd::{ForkResult, fork};

    let Some(path) = rendezvous_path(iv) else {
        return false;
    };

    // The tool is single-threaded, and parent and child share no
    // mutable state after the fork.
    match unsafe { fork() } {
        Err(e) => {
            warning(&format!("could not fork() agent -- {e}"));
            false
        }
        Ok(ForkResult::Parent { .. }) => true,
        Ok(ForkResult::Child) => {
            serve(&path, key, timeout_secs);
            process::exit(0);
        }
    }
}

#[cfg(not(unix))]
pub fn spawn(_key: &[u8; 32], _iv: &[u8; 8], _timeout_secs: u32) -> bool {
    false
}

/// Agent child: detach, claim the socket, serve keys until idle.
#[cfg(unix)]
fn serve(path: &Path, key: &[u8; 32], timeout_secs: u32) {
    use nix::sys::stat::{Mode, umask};
    use nix::unistd::close;

    let _ = close(0);
    let _ = close(1);
    umask(Mode::from_bits_truncate(0o077));

    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warning(&format!("failed to remove existing socket -- {e}"));
            process::exit(1);
        }
    }

    let listener = match UnixListener::bind(path) {
        Ok(listener) => listener,
        Err(e) => {
            // Losing the bind race to another agent serving the same
            // key is fine; anything else deserves a warning.
            if e.kind() != std::io::ErrorKind::AddrInUse {
                warning(&format!(
                    "could not bind agent socket {} -- {e}",
                    path.display()
                ));
            }
            process::exit(1);
        }
    };

    let _ = close(2);
    if !serve_loop(&listener, path, key, timeout_secs) {
        process::exit(1);
    }
}

/// Accept loop gated by a poll with an idle timeout.
///
/// Serves the key to each connection; on timeout the socket is unlinked
/// and the loop ends. Returns `false` on a poll failure (the socket is
/// unlinked there too).
#[cfg(unix)]
fn serve_loop(listener: &UnixListener, path: &Path, key: &[u8; 32], timeout_secs: u32) -> bool {
    use std::io::Write;

    let timeout_ms =
        i32::try_from(u64::from(timeout_secs).saturating_mul(1000)).unwrap_or(i32::MAX);

    loop {
        let mut fds = [PollFd::new(listener.as_raw_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout_ms) {
            Err(_) => {
                let _ = std::fs::remove_file(path);
                return false;
            }
            Ok(0) => {
                // Idle timeout.
                let _ = std::fs::remove_file(path);
                return true;
            }
            Ok(_) => {
                if let Ok((mut stream, _)) = listener.accept() {
                    let _ = stream.write_all(key);
                }
            }
        }
    }
}
