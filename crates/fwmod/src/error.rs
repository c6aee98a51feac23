//! Errors produced while resolving and materializing modules

use crate::vcs::VcsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or materializing a module
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Neither name nor location is set, or the kind cannot be determined
    #[error("Invalid module descriptor: {0}")]
    InvalidDescriptor(String),

    /// Name could not be derived from the location
    #[error("Cannot derive module name from location {location:?}: {reason}")]
    UnknownName { location: String, reason: String },

    /// Location could not be turned into a local path
    #[error("Invalid module location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Filesystem error other than "not found"
    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Version-control operation failed
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Reference is neither a branch, a tag, nor a hash even after a fetch
    #[error("Reference {reference:?} in {} is neither a branch, a tag, nor a hash", dir.display())]
    AmbiguousReference { reference: String, dir: PathBuf },
}

impl ModuleError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModuleError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error comes from a malformed descriptor rather than from
    /// the filesystem or version control
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ModuleError::InvalidDescriptor(_)
                | ModuleError::UnknownName { .. }
                | ModuleError::InvalidLocation { .. }
        )
    }

    /// Whether a wipe-and-reclone retry applies to this error
    ///
    /// Configuration errors and unknown references are never retried.
    pub fn is_retryable(&self) -> bool {
        !self.is_configuration() && !matches!(self, ModuleError::AmbiguousReference { .. })
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ModuleError>;
