//! Default key-file locations.

use std::path::PathBuf;

use crate::error::Result;

/// Default public-key file, creating the config directory if needed.
///
/// # Errors
///
/// Errors if the per-user configuration directory cannot be resolved or
/// created.
pub fn default_pubfile() -> Result<PathBuf> {
    storage_directory("enchive.pub")
}

/// Default secret-key file, creating the config directory if needed.
///
/// # Errors
///
/// Errors if the per-user configuration directory cannot be resolved or
/// created.
pub fn default_secfile() -> Result<PathBuf> {
    storage_directory("enchive.sec")
}

/// Use `$XDG_CONFIG_HOME/enchive`, or `$HOME/.config/enchive`.
#[cfg(unix)]
fn storage_directory(file: &str) -> Result<PathBuf> {
    use std::env;
    use std::fs::DirBuilder;
    use std::os::unix::fs::DirBuilderExt;

    use crate::error::Error;

    let base = match env::var_os("XDG_CONFIG_HOME") {
        Some(config) => {
            let config = PathBuf::from(config);
            if !config.is_absolute() {
                return Err(Error::Other("$XDG_CONFIG_HOME is not absolute".to_string()));
            }
            config
        }
        None => {
            let Some(home) = env::var_os("HOME") else {
                return Err(Error::Other(
                    "no $HOME or $XDG_CONFIG_HOME, giving up".to_string(),
                ));
            };
            let home = PathBuf::from(home);
            if !home.is_absolute() {
                return Err(Error::Other("$HOME is not absolute".to_string()));
            }
            home.join(".config")
        }
    };

    let dir = base.join("enchive");
    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&dir)
        .map_err(|e| Error::Other(format!("mkdir({}) -- {e}", dir.display())))?;

    Ok(dir.join(file))
}

/// Use `%APPDATA%\enchive`.
#[cfg(windows)]
fn storage_directory(file: &str) -> Result<PathBuf> {
    use std::env;
    use std::fs;

    use crate::error::Error;

    let Some(appdata) = env::var_os("APPDATA") else {
        return Err(Error::Other("$APPDATA is unset".to_string()));
    };

    let dir = PathBuf::from(appdata).join("enchive");
    fs::create_dir_all(&dir)
        .map_err(|e| Error::Other(format!("mkdir({}) -- {e}", dir.display())))?;

    Ok(dir.join(file))
}
