use std::path::PathBuf;

use enchive::crypto::kdf;

/// Default iteration exponent protecting the secret key at rest.
pub const DEFAULT_PROTECT_IEXP: u8 = 29;
/// Default iteration exponent for `keygen --derive`.
pub const DEFAULT_DERIVE_IEXP: u8 = 29;
/// Idle timeout, in seconds, when `--agent` is given without a value.
pub const DEFAULT_AGENT_TIMEOUT: u32 = 3600;

#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    Keygen(KeygenArgs),
    Fingerprint,
    Archive(FileArgs),
    Extract(FileArgs),
}

#[derive(Debug, Eq, PartialEq)]
pub struct KeygenArgs {
    /// Derive the secret key from a passphrase at this exponent.
    pub derive: Option<u8>,
    pub edit: bool,
    pub force: bool,
    pub fingerprint: bool,
    pub iterations: u8,
    pub plain: bool,
}

impl Default for KeygenArgs {
    fn default() -> Self {
        Self {
            derive: None,
            edit: false,
            force: false,
            fingerprint: false,
            iterations: DEFAULT_PROTECT_IEXP,
            plain: false,
        }
    }
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct FileArgs {
    pub delete: bool,
    pub infile: Option<PathBuf>,
    pub outfile: Option<PathBuf>,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct Args {
    pub command: Option<Command>,
    pub pubkey: Option<PathBuf>,
    pub seckey: Option<PathBuf>,
    /// Zero disables the agent entirely.
    pub agent_timeout: u32,
    pub short_help: bool,
    pub long_help: bool,
    pub version: bool,
}

impl Args {
    /// Parse global options up to the first verb, then hand the rest to
    /// the verb's own parser.
    pub fn build_from_args<I>(mut cli_args: I) -> Result<Self, String>
    where
        I: Iterator<Item: AsRef<str> + ToString>,
    {
        let mut args = Self::default();

        while let Some(arg) = cli_args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" => args.short_help = true,
                "--help" => args.long_help = true,
                "-V" | "--version" => args.version = true,
                "-p" | "--pubkey" => {
                    args.pubkey = Some(PathBuf::from(required_value(arg, &mut cli_args)?));
                }
                "-s" | "--seckey" => {
                    args.seckey = Some(PathBuf::from(required_value(arg, &mut cli_args)?));
                }
                "-a" | "--agent" => args.agent_timeout = DEFAULT_AGENT_TIMEOUT,
                "-A" | "--no-agent" => args.agent_timeout = 0,
                _ if arg.starts_with("--pubkey=") => {
                    args.pubkey = Some(PathBuf::from(&arg["--pubkey=".len()..]));
                }
                _ if arg.starts_with("--seckey=") => {
                    args.seckey = Some(PathBuf::from(&arg["--seckey=".len()..]));
                }
                _ if arg.starts_with("--agent=") => {
                    let value = &arg["--agent=".len()..];
                    args.agent_timeout = value
                        .parse()
                        .map_err(|_| format!("invalid --agent argument -- '{value}'"))?;
                }
                verb if !verb.starts_with('-') => {
                    let rest: Vec<String> = cli_args.map(|a| a.to_string()).collect();
                    args.command = Some(Command::from_args(verb, &rest)?);
                    break;
                }
                unknown => {
                    return Err(format!("unknown option: '{unknown}'"));
                }
            }
        }

        Ok(args)
    }
}

impl Command {
    fn from_args(verb: &str, rest: &[String]) -> Result<Self, String> {
        match match_verb(verb)? {
            Verb::Keygen => Ok(Self::Keygen(KeygenArgs::parse(rest)?)),
            Verb::Fingerprint => match rest.first() {
                None => Ok(Self::Fingerprint),
                Some(unexpected) => Err(format!("unexpected argument: '{unexpected}'")),
            },
            Verb::Archive => Ok(Self::Archive(FileArgs::parse(rest)?)),
            Verb::Extract => Ok(Self::Extract(FileArgs::parse(rest)?)),
        }
    }
}

#[derive(Clone, Copy)]
enum Verb {
    Keygen,
    Fingerprint,
    Archive,
    Extract,
}

/// Match a (possibly abbreviated) verb, so `arch` means `archive`.
fn match_verb(verb: &str) -> Result<Verb, String> {
    const VERBS: [(&str, Verb); 4] = [
        ("keygen", Verb::Keygen),
        ("fingerprint", Verb::Fingerprint),
        ("archive", Verb::Archive),
        ("extract", Verb::Extract),
    ];

    let mut matched = None;
    for (name, candidate) in VERBS {
        if name.starts_with(verb) && !verb.is_empty() {
            if matched.is_some() {
                return Err(format!("ambiguous command: '{verb}'"));
            }
            matched = Some(candidate);
        }
    }
    matched.ok_or_else(|| format!("unknown command: '{verb}'"))
}

impl KeygenArgs {
    fn parse(rest: &[String]) -> Result<Self, String> {
        let mut args = Self::default();

        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            let arg = arg.as_str();
            match arg {
                "-d" | "--derive" => args.derive = Some(DEFAULT_DERIVE_IEXP),
                "-e" | "--edit" => args.edit = true,
                "-f" | "--force" => args.force = true,
                "-i" | "--fingerprint" => args.fingerprint = true,
                "-u" | "--plain" => args.plain = true,
                "-k" | "--iterations" => {
                    args.iterations = parse_iexp(arg, &required_value(arg, &mut iter)?)?;
                }
                _ if arg.starts_with("--derive=") => {
                    args.derive = Some(parse_iexp("--derive", &arg["--derive=".len()..])?);
                }
                _ if arg.starts_with("--iterations=") => {
                    args.iterations =
                        parse_iexp("--iterations", &arg["--iterations=".len()..])?;
                }
                unexpected => {
                    return Err(format!("unexpected argument: '{unexpected}'"));
                }
            }
        }

        if args.edit && args.derive.is_some() {
            return Err("--edit and --derive are mutually exclusive".to_string());
        }

        Ok(args)
    }
}

impl FileArgs {
    fn parse(rest: &[String]) -> Result<Self, String> {
        let mut args = Self::default();

        for arg in rest {
            let arg = arg.as_str();
            match arg {
                "-d" | "--delete" => args.delete = true,
                option if option.starts_with('-') && option != "-" => {
                    return Err(format!("unknown option: '{option}'"));
                }
                file => {
                    if args.infile.is_none() {
                        args.infile = Some(PathBuf::from(file));
                    } else if args.outfile.is_none() {
                        args.outfile = Some(PathBuf::from(file));
                    } else {
                        return Err(format!("unexpected argument: '{file}'"));
                    }
                }
            }
        }

        Ok(args)
    }
}

fn required_value<I>(flag: &str, args: &mut I) -> Result<String, String>
where
    I: Iterator<Item: AsRef<str> + ToString>,
{
    args.next()
        .map(|value| value.to_string())
        .ok_or_else(|| format!("missing value for '{flag}'"))
}

fn parse_iexp(flag: &str, value: &str) -> Result<u8, String> {
    match value.parse::<u8>() {
        Ok(n) if (kdf::IEXP_MIN..=kdf::IEXP_MAX).contains(&n) => Ok(n),
        _ => Err(format!(
            "{flag} argument must be {min} <= n <= {max} -- '{value}'",
            min = kdf::IEXP_MIN,
            max = kdf::IEXP_MAX,
        )),
    }
}
