//! The error taxonomy of this crate

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading configuration, talking to a
/// CalDAV server, or mutating a task.
///
/// Most callers only ever bubble these up; the plugin layer swallows the
/// per-profile and per-task variants and degrades to "no results" instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file does not exist yet
    #[error("configuration file {0:?} does not exist")]
    ConfigMissing(PathBuf),

    /// The configuration file exists but defines no profile
    #[error("configuration file {0:?} defines no profiles")]
    ConfigEmpty(PathBuf),

    /// The configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The template file or its parent directory could not be written
    #[error("unable to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening a session or resolving collections failed for one profile
    #[error("connection to profile {profile:?} failed: {message}")]
    ConnectionFailure { profile: String, message: String },

    /// A mutation referenced a profile that is not configured
    #[error("profile {0:?} is not configured")]
    UnknownProfile(String),

    /// A mutation target could not be found on the server
    #[error("no task {uid:?} in profile {profile:?}")]
    TaskNotFound { profile: String, uid: String },

    /// The server sent a WebDAV response this crate could not interpret
    #[error("unexpected DAV response: {0}")]
    Dav(String),

    /// An iCal payload could not be parsed or built
    #[error("invalid iCalendar data: {0}")]
    Ical(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
