#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const ENCHIVE: &str = env!("CARGO_BIN_EXE_enchive");
const TMP_DIR: &str = env!("CARGO_TARGET_TMPDIR");

#[derive(Debug)]
pub struct Output {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Like [`Output`], but for binary streams.
#[derive(Debug)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// A fresh scratch directory under the target tmpdir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = Path::new(TMP_DIR).join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub struct KeyPair {
    pub pubfile: String,
    pub secfile: String,
}

/// Generate an unprotected key pair inside `dir`.
pub fn plain_keypair(dir: &Path) -> KeyPair {
    fs::create_dir_all(dir).unwrap();
    let pubfile = dir.join("enchive.pub").to_string_lossy().to_string();
    let secfile = dir.join("enchive.sec").to_string_lossy().to_string();

    let output = run(&[
        "--pubkey", &pubfile, "--seckey", &secfile, "keygen", "--plain",
    ]);
    assert_eq!(output.exit_code, 0, "keygen failed: {output:?}");

    KeyPair { pubfile, secfile }
}

pub fn run(args: &[&str]) -> Output {
    let mut command = Command::new(ENCHIVE);
    command.env("NO_COLOR", "1");
    command.env_remove("PAGER");

    for arg in args {
        command.arg(arg);
    }

    let output = command.output().unwrap();

    Output {
        exit_code: output.status.code().unwrap(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Run with environment overrides (e.g., a fake `$XDG_CONFIG_HOME`).
pub fn run_env(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(ENCHIVE);
    command.env("NO_COLOR", "1");
    command.env_remove("PAGER");

    for (key, value) in envs {
        command.env(key, value);
    }
    for arg in args {
        command.arg(arg);
    }

    let output = command.output().unwrap();

    Output {
        exit_code: output.status.code().unwrap(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Run with bytes piped through stdin, capturing raw stdout.
pub fn run_raw(args: &[&str], stdin: &[u8]) -> RawOutput {
    let mut command = Command::new(ENCHIVE);
    command.env("NO_COLOR", "1");
    command.stdin(Stdio::piped());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    for arg in args {
        command.arg(arg);
    }

    let mut child = command.spawn().unwrap();

    // Feed stdin from a separate thread so neither side blocks on a
    // full pipe.
    let mut stdin_pipe = child.stdin.take().unwrap();
    let payload = stdin.to_vec();
    let feeder = std::thread::spawn(move || {
        let _ = stdin_pipe.write_all(&payload);
    });
    let output = child.wait_with_output().unwrap();
    feeder.join().unwrap();

    RawOutput {
        exit_code: output.status.code().unwrap(),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

pub fn checksum(path: &Path) -> String {
    let payload = fs::read(path).unwrap();
    let hash = blake3::hash(&payload);
    // Hexadecimal is nicer to debug than plain bytes.
    hash.to_hex().to_string()
}
