//! Unified error types for the Millennium controller.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! daemon edge can report failures uniformly.  None of these escape the
//! main loop: the controller logs them and keeps running.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// Serial link to the panel failed.
    Link(LinkError),
    /// State file could not be written or read.
    Persist(PersistError),
    /// Plugin registry rejected a request.
    Plugin(PluginError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Persist(e) => write!(f, "persistence: {e}"),
            Self::Plugin(e) => write!(f, "plugin: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum LinkError {
    /// The tty could not be opened or configured.
    Open(std::io::Error),
    /// Write kept returning would-block past the retry limit.
    RetriesExhausted { written: usize, total: usize },
    /// Any other read/write failure; the device is considered unavailable.
    Io(std::io::Error),
    /// Outbound message does not fit the one-byte length prefix.
    MessageTooLong(usize),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e) => write!(f, "open failed: {e}"),
            Self::RetriesExhausted { written, total } => {
                write!(f, "write abandoned after retries ({written}/{total} bytes)")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::MessageTooLong(len) => write!(f, "message too long ({len} bytes)"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PersistError {
    /// Creating, writing or syncing the temp file failed.
    Write(std::io::Error),
    /// Renaming the temp file over the target failed (temp file removed).
    Rename(std::io::Error),
    /// A field cannot be stored as one `key=value` line and read back.
    InvalidValue(&'static str),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(e) => write!(f, "write failed: {e}"),
            Self::Rename(e) => write!(f, "rename failed: {e}"),
            Self::InvalidValue(key) => write!(f, "{key} cannot be stored"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<PersistError> for Error {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

// ---------------------------------------------------------------------------
// Plugin errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// A plugin with this name is already registered.
    DuplicateName(String),
    /// No plugin with this name is registered.
    UnknownName(String),
    /// The registry holds its maximum number of plugins.
    RegistryFull,
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "plugin '{name}' already registered"),
            Self::UnknownName(name) => write!(f, "no plugin named '{name}'"),
            Self::RegistryFull => write!(f, "plugin registry full"),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<PluginError> for Error {
    fn from(e: PluginError) -> Self {
        Self::Plugin(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
