//! App manifest parsing
//!
//! Only the dependency lists of a firmware app manifest are read here:
//!
//! ```yaml
//! libs:
//!   - origin: https://github.com/acme/wifi
//!   - location: https://github.com/acme/sensors
//!     version: v2.0
//!     weak: true
//! modules:
//!   - location: ../shared/board
//! ```
//!
//! YAML and JSON are both accepted; JSON is picked by the `.json` extension.

use crate::descriptor::ModuleDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("Failed to parse manifest: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Failed to parse JSON
    #[error("Failed to parse manifest: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    ValidationError(String),
}

/// Whether a declared module is a library or another kind of module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyRole {
    Lib,
    Module,
}

impl std::fmt::Display for DependencyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyRole::Lib => write!(f, "lib"),
            DependencyRole::Module => write!(f, "module"),
        }
    }
}

/// Dependency lists of an app manifest
///
/// Entries are normalized while deserializing, see
/// [`RawModuleDescriptor`](crate::RawModuleDescriptor).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Libraries; may be weak
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libs: Vec<ModuleDescriptor>,

    /// Other modules the app depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleDescriptor>,
}

impl Manifest {
    /// Parse a manifest file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject entries with neither name nor location
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (role, idx, d) in self.indexed() {
            if d.location.is_empty() && d.name.is_empty() {
                return Err(ManifestError::ValidationError(format!(
                    "{} #{} has neither name nor location",
                    role, idx
                )));
            }
        }
        Ok(())
    }

    /// All declared modules, libs first
    pub fn dependencies(&self) -> impl Iterator<Item = (DependencyRole, &ModuleDescriptor)> {
        self.indexed().map(|(role, _, d)| (role, d))
    }

    fn indexed(&self) -> impl Iterator<Item = (DependencyRole, usize, &ModuleDescriptor)> {
        let libs = self
            .libs
            .iter()
            .enumerate()
            .map(|(i, d)| (DependencyRole::Lib, i, d));
        let modules = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, d)| (DependencyRole::Module, i, d));
        libs.chain(modules)
    }

    /// Weak libs, which an app may build without
    pub fn weak_libs(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.libs.iter().filter(|d| d.weak)
    }
}
