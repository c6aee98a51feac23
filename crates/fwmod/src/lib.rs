//! Firmware module materializer
//!
//! This crate turns declared firmware dependencies (libs and modules) into
//! local directories:
//! - Descriptor normalization and kind/name/version resolution
//! - Deterministic per-version directories under a shared libs directory
//! - Clean/dirty detection of existing checkouts
//! - Git synchronization that never overwrites local edits, with an optional
//!   single wipe-and-reclone retry
//! - Manifest and configuration loading for the `fwmod` tool

pub mod clean;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod materialize;
pub mod path;
pub mod sync;
pub mod vcs;

pub use clean::is_clean;
pub use config::{Config, ConfigError};
pub use descriptor::{ModuleDescriptor, ModuleKind, RawModuleDescriptor, DEFAULT_REFERENCE};
pub use error::{ModuleError, Result};
pub use manifest::{DependencyRole, Manifest, ManifestError};
pub use materialize::{Materializer, PathCache};
pub use path::{local_dir, version_suffix};
pub use sync::{SyncEngine, SyncOptions, SyncOutcome};
pub use vcs::{
    hashes_equal, looks_like_hash, CloneOptions, FetchOptions, RefKind, SystemGit, Vcs, VcsError,
};
