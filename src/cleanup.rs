//! Output files that vanish unless committed.
//!
//! Every file this tool creates (archive output, key files) is acquired
//! as an [`OutputFile`]: dropping the handle unlinks the file, an
//! explicit [`OutputFile::commit`] at the end of the operation keeps it.
//! Error paths simply propagate and the half-written file disappears.
//! A signal handler covers interruption between create and commit.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::ptr;
#[cfg(unix)]
use std::sync::atomic::{AtomicPtr, Ordering};

#[cfg(unix)]
use nix::libc;

/// At most an archive output plus the two key files exist per
/// invocation.
#[cfg(unix)]
const SLOTS: usize = 3;

#[cfg(unix)]
static PENDING: [AtomicPtr<libc::c_char>; SLOTS] =
    [const { AtomicPtr::new(ptr::null_mut()) }; SLOTS];

/// Install SIGINT/SIGTERM handling that unlinks pending outputs.
#[cfg(unix)]
pub fn install_signal_handler() {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGINT, &action);
        let _ = sigaction(Signal::SIGTERM, &action);
    }
}

#[cfg(not(unix))]
pub fn install_signal_handler() {}

#[cfg(unix)]
extern "C" fn on_signal(_signal: libc::c_int) {
    // Only async-signal-safe calls from here on.
    for slot in &PENDING {
        let path = slot.load(Ordering::Acquire);
        if !path.is_null() {
            unsafe { libc::unlink(path) };
        }
    }
    unsafe { libc::_exit(1) };
}

#[cfg(unix)]
fn register(path: &Path) -> Option<usize> {
    use std::os::unix::ffi::OsStrExt;

    let path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let raw = path.into_raw();
    for (i, slot) in PENDING.iter().enumerate() {
        if slot
            .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return Some(i);
        }
    }
    // More outputs than slots; retake so the string is not leaked.
    drop(unsafe { CString::from_raw(raw) });
    None
}

#[cfg(unix)]
fn clear(slot: usize) {
    let raw = PENDING[slot].swap(ptr::null_mut(), Ordering::AcqRel);
    if !raw.is_null() {
        drop(unsafe { CString::from_raw(raw) });
    }
}

/// A freshly created output file that is deleted on drop unless
/// committed.
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    path: PathBuf,
    #[cfg(unix)]
    slot: Option<usize>,
    committed: bool,
}

impl OutputFile {
    /// Create (or truncate) `path` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Errors if the file cannot be created.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            #[cfg(unix)]
            slot: register(path),
            committed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
        #[cfg(unix)]
        if let Some(slot) = self.slot {
            clear(slot);
        }
    }
}
