//! Error types for the update subsystem.

/// Top-level error type for version checks, downloads, and update application.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Timeout, connection failure, or non-200 response.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed JSON payload or version string.
    #[error("parse error: {0}")]
    Parse(String),

    /// Current build is too old to apply the update in place.
    #[error("incompatible version: {0}")]
    IncompatibleVersion(String),

    /// Operation attempted in a context where it cannot work
    /// (e.g. applying an update outside a packaged install).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// File or directory could not be created, written, or removed.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// The detached update script could not be spawned.
    #[error("launch error: {0}")]
    Launch(String),

    /// Downloaded artifact does not match the published digest.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Configuration file error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`UpdateError`], for callers that only need
/// to branch on the failure category (e.g. to pick a user-facing message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Parse,
    IncompatibleVersion,
    Precondition,
    Filesystem,
    Launch,
    Integrity,
    Config,
}

impl UpdateError {
    /// Returns the failure category of this error.
    ///
    /// Raw I/O errors are reported as [`ErrorKind::Filesystem`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Parse(_) => ErrorKind::Parse,
            Self::IncompatibleVersion(_) => ErrorKind::IncompatibleVersion,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Filesystem(_) | Self::Io(_) => ErrorKind::Filesystem,
            Self::Launch(_) => ErrorKind::Launch,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
