mod cmd;

use std::env;
use std::process;

use lessify::Pager;

use cmd::cli;

fn main() {
    let mut args = match cli::Args::build_from_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{bin}: {err}", bin = env!("CARGO_BIN_NAME"));
            println!("Try '{bin} -h' for help.", bin = env!("CARGO_BIN_NAME"));
            process::exit(2);
        }
    };

    if args.long_help {
        long_help();
    } else if args.short_help {
        short_help();
    } else if args.version {
        version();
    } else if let Some(command) = args.command.take() {
        // Interruption must not leave half-written outputs behind.
        enchive::cleanup::install_signal_handler();

        let result = match &command {
            cli::Command::Keygen(opts) => cmd::keygen(&args, opts),
            cli::Command::Fingerprint => cmd::fingerprint(&args),
            cli::Command::Archive(opts) => cmd::archive(&args, opts),
            cli::Command::Extract(opts) => cmd::extract(&args, opts),
        };

        if let Err(err) = result {
            eprintln!("{bin}: {err}", bin = env!("CARGO_BIN_NAME"));
            process::exit(1);
        }
    } else {
        // No arguments.
        eprintln!("{bin}: missing command", bin = env!("CARGO_BIN_NAME"));
        short_help();
        process::exit(2);
    }
}

fn short_help() {
    println!("{}", short_help_message());
    println!(
        "For full help, see `{bin} --help`.",
        bin = env!("CARGO_BIN_NAME")
    );
}

fn short_help_message() -> String {
    format!(
        "\
{description}

Usage: {bin} [<options>] <command> [<args>]

Commands:
  keygen                 Generate a key pair
  fingerprint            Print the public key fingerprint
  archive [FILE [OUT]]   Encrypt a file to the public key
  extract [FILE [OUT]]   Decrypt an archive with the secret key

Options:
  -p, --pubkey <FILE>    Use this public key file
  -s, --seckey <FILE>    Use this secret key file
  -a, --agent[=SECS]     Keep a key agent around after decryption
  -A, --no-agent         Never start or consult a key agent
  -h, --help             Show this message and exit
  -V, --version          Show the version and exit
",
        description = env!("CARGO_PKG_DESCRIPTION"),
        bin = env!("CARGO_BIN_NAME"),
    )
}

#[allow(clippy::too_many_lines)]
fn long_help() {
    Pager::page_or_print(&format!(
        "\
{help}
Command options:
  keygen:
    -d, --derive[=N]     Derive the secret key from a passphrase
    -e, --edit           Change the protection on an existing secret key
    -f, --force          Overwrite existing key files
    -i, --fingerprint    Print the key fingerprint while generating
    -k, --iterations <N> Protection key derivation exponent (5-31)
    -u, --plain          Store the secret key unprotected
  archive, extract:
    -d, --delete         Delete the input file after success

What does {package} do?
  {package} encrypts files to your own Curve25519 key pair for long-term
  archival. Encrypting needs no passphrase, only the public key; the
  secret key is itself encrypted at rest under a passphrase-derived key.
  Commands may be abbreviated to any unambiguous prefix ('arch' works
  for 'archive').

  With no input file, 'archive' and 'extract' stream from standard
  input to standard output. With an input file and no output file,
  'archive' appends '.enchive' and 'extract' strips it.

  With --agent, a small background process holds the passphrase-derived
  key in memory after a decryption, so nearby extractions don't prompt
  again. It expires after the idle timeout.
",
        help = short_help_message(),
        package = env!("CARGO_PKG_NAME"),
    ));
}

fn version() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}
