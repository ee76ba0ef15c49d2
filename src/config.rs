//! The user-maintained calendar profiles
//!
//! Profiles live in a flat `calendars.toml` file, one table per calendar
//! account. A missing file is not fatal: the caller is expected to write
//! [`write_template`] and point the user at it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// The file name of the profile configuration, below [`default_path`]'s directory
pub const CONFIG_FILE_NAME: &str = "calendars.toml";

/// Contents written to a freshly created configuration file
pub const CONFIG_TEMPLATE: &str = r#"# Please edit this file with the calendars you want to manage the todos for,
# one table per calendar.
#
# For example:
#
# [Work]
# url = "http://my.calendar/dav/work/"
# username = "username"
# password = "pa$$word"
"#;

/// One named calendar account
#[derive(Clone, Deserialize, PartialEq)]
pub struct Profile {
    /// URL of the calendar collection holding the tasks
    pub url: Url,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Profile {
    // The password is not shown
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish()
    }
}

/// The full profile set, keyed by profile name.
/// A `BTreeMap` keeps the profile order deterministic.
pub type Profiles = BTreeMap<String, Profile>;

/// Where the configuration file lives for the current user
/// (`~/.config/tododav/calendars.toml` on Linux)
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tododav").join(CONFIG_FILE_NAME))
}

/// Load the profile set from `path`.
///
/// Fails with [`Error::ConfigMissing`] if the file does not exist (callers
/// respond by writing a template there) and with [`Error::ConfigEmpty`] if it
/// exists but defines zero profiles ("not yet configured").
pub fn load(path: &Path) -> Result<Profiles> {
    let content = match std::fs::read_to_string(path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ConfigMissing(path.to_path_buf()));
        },
        Err(err) => {
            return Err(Error::ConfigInvalid(format!("unable to read {:?}: {}", path, err)));
        },
        Ok(content) => content,
    };

    let profiles: Profiles = toml::from_str(&content)
        .map_err(|err| Error::ConfigInvalid(err.to_string()))?;

    if profiles.is_empty() {
        return Err(Error::ConfigEmpty(path.to_path_buf()));
    }

    log::info!("Loaded {} profile(s) from {:?}", profiles.len(), path);
    Ok(profiles)
}

/// Create the configuration directory and write [`CONFIG_TEMPLATE`] to `path`
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| Error::WriteFailure {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, CONFIG_TEMPLATE).map_err(|source| Error::WriteFailure {
        path: path.to_path_buf(),
        source,
    })
}
