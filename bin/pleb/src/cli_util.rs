/* This file is part of DePlebs DAO
 *
 * Copyright (C) 2022-2025 DePlebs developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    env, fs,
    io::{stdin, stdout, Write},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Auxiliary function to expand a leading tilde in a filesystem path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    if path == "~" || path.starts_with("~/") {
        let Ok(home) = env::var("HOME") else {
            return Err(Error::ConfigError("Could not fetch path for home directory".to_string()))
        };

        if let Some(remains) = path.strip_prefix("~/") {
            return Ok(Path::new(&home).join(remains))
        }

        return Ok(PathBuf::from(home))
    }

    Ok(PathBuf::from(path))
}

/// Auxiliary function to resolve the configuration file path.
/// An explicit path takes precedence, otherwise the file lives in the
/// user's config directory.
pub fn get_config_path(config: Option<String>, name: &str) -> Result<PathBuf> {
    match config {
        Some(path) => expand_path(&path),
        None => Ok(expand_path("~/.config/deplebs")?.join(name)),
    }
}

/// Auxiliary function to spawn the default configuration file if it is
/// not in place already.
pub fn spawn_config(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(())
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, contents)?;
    println!("Initialized configuration file: {}", path.display());

    Ok(())
}

/// Auxiliary function to ask the user for transaction confirmation.
/// Anything but an explicit "y"/"yes" counts as a refusal.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    stdout().flush()?;

    let mut line = String::new();
    stdin().read_line(&mut line)?;

    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path() {
        env::set_var("HOME", "/home/pleb");
        assert_eq!(expand_path("~").unwrap(), PathBuf::from("/home/pleb"));
        assert_eq!(expand_path("~/wallet.json").unwrap(), PathBuf::from("/home/pleb/wallet.json"));
        assert_eq!(expand_path("/tmp/wallet.json").unwrap(), PathBuf::from("/tmp/wallet.json"));
        assert_eq!(expand_path("relative/wallet.json").unwrap(), PathBuf::from("relative/wallet.json"));
    }

    #[test]
    fn test_get_config_path() {
        env::set_var("HOME", "/home/pleb");
        assert_eq!(
            get_config_path(None, "pleb_config.toml").unwrap(),
            PathBuf::from("/home/pleb/.config/deplebs/pleb_config.toml"),
        );
        assert_eq!(
            get_config_path(Some("/etc/pleb.toml".to_string()), "pleb_config.toml").unwrap(),
            PathBuf::from("/etc/pleb.toml"),
        );
    }
}
