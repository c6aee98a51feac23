//! Module descriptors
//!
//! A descriptor is the in-memory form of a declared lib or app dependency.
//! Declarations are deserialized into [`RawModuleDescriptor`], which still
//! carries the deprecated `origin` key, and normalized exactly once into the
//! canonical [`ModuleDescriptor`] that the rest of the crate works with.

use crate::error::{ModuleError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Reference used when neither the descriptor nor the caller names one
pub const DEFAULT_REFERENCE: &str = "master";

/// Version string that is treated the same as an unspecified version
pub const LATEST: &str = "latest";

/// Host whose URLs are treated as remote git repositories
pub const GITHUB_HOST: &str = "github.com";

/// Declared module as it appears in a manifest
///
/// `origin` is the pre-`location` spelling of the same field and is only
/// kept so older manifests still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawModuleDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix_template: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub weak: bool,
}

impl RawModuleDescriptor {
    /// Produce the canonical descriptor
    ///
    /// `location` wins over `origin` when both are set.
    pub fn normalize(self) -> ModuleDescriptor {
        let location = if self.location.is_empty() {
            self.origin
        } else {
            self.location
        };

        ModuleDescriptor {
            kind_hint: self.kind,
            location,
            version: self.version,
            name: self.name,
            suffix_template: self.suffix_template,
            weak: self.weak,
        }
    }
}

impl From<ModuleDescriptor> for RawModuleDescriptor {
    fn from(d: ModuleDescriptor) -> Self {
        // Older readers only know `origin`, so write the location twice.
        RawModuleDescriptor {
            kind: d.kind_hint,
            origin: d.location.clone(),
            location: d.location,
            version: d.version,
            name: d.name,
            suffix_template: d.suffix_template,
            weak: d.weak,
        }
    }
}

/// Kind of a module, derived from its descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Neither name nor location is given
    Invalid,
    /// Directory on the local filesystem, never synchronized
    Local,
    /// Git repository hosted remotely
    RemoteRepo,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Invalid => write!(f, "invalid"),
            ModuleKind::Local => write!(f, "local"),
            ModuleKind::RemoteRepo => write!(f, "remote"),
        }
    }
}

/// Canonical, normalized module descriptor
///
/// Deserializing goes through [`RawModuleDescriptor::normalize`], so a
/// `ModuleDescriptor` never exposes the deprecated `origin` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawModuleDescriptor", into = "RawModuleDescriptor")]
pub struct ModuleDescriptor {
    /// Explicit kind (`github`, `git`, `local`), empty to infer it
    pub kind_hint: String,
    /// URL or filesystem path of the module
    pub location: String,
    /// Requested branch, tag or commit hash; empty means the caller default
    pub version: String,
    /// Explicit name; derived from `location` when empty
    pub name: String,
    /// Template for the version suffix of the local directory name
    pub suffix_template: String,
    /// Soft dependency (libs only)
    pub weak: bool,
}

impl From<RawModuleDescriptor> for ModuleDescriptor {
    fn from(raw: RawModuleDescriptor) -> Self {
        raw.normalize()
    }
}

impl ModuleDescriptor {
    /// Descriptor for a remote repository location
    pub fn remote(location: impl Into<String>) -> Self {
        ModuleDescriptor {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Set the requested version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set an explicit name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the directory suffix template
    pub fn with_suffix_template(mut self, tpl: impl Into<String>) -> Self {
        self.suffix_template = tpl.into();
        self
    }

    /// Classify the module
    pub fn kind(&self) -> ModuleKind {
        if self.location.is_empty() && self.name.is_empty() {
            return ModuleKind::Invalid;
        }

        if !self.kind_hint.is_empty() {
            return match self.kind_hint.as_str() {
                "github" | "git" => ModuleKind::RemoteRepo,
                _ => ModuleKind::Local,
            };
        }

        if self.location.is_empty() {
            return ModuleKind::Local;
        }

        match Url::parse(&self.location) {
            Ok(u) if u.host_str() == Some(GITHUB_HOST) => ModuleKind::RemoteRepo,
            _ => ModuleKind::Local,
        }
    }

    /// Human-readable module name
    pub fn name(&self) -> Result<String> {
        if !self.name.is_empty() {
            check_dir_name(&self.name)?;
            return Ok(self.name.clone());
        }

        match self.kind() {
            ModuleKind::RemoteRepo => {
                let u = Url::parse(&self.location).map_err(|e| ModuleError::UnknownName {
                    location: self.location.clone(),
                    reason: e.to_string(),
                })?;
                let last = u
                    .path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                    .ok_or_else(|| ModuleError::UnknownName {
                        location: self.location.clone(),
                        reason: format!("path is empty in the URL {:?}", u.path()),
                    })?;
                Ok(last.strip_suffix(".git").unwrap_or(last).to_string())
            }
            ModuleKind::Local => Path::new(&self.location)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ModuleError::UnknownName {
                    location: self.location.clone(),
                    reason: "name is empty in the location".to_string(),
                }),
            ModuleKind::Invalid => Err(ModuleError::InvalidDescriptor(
                "name is not specified, and the module kind is unknown".to_string(),
            )),
        }
    }

    /// Git reference to check out
    ///
    /// An empty or `latest` version, after falling back to `default_version`,
    /// becomes `master`.
    pub fn resolved_reference(&self, default_version: &str) -> String {
        let version = if self.version.is_empty() {
            default_version
        } else {
            self.version.as_str()
        };

        if version.is_empty() || version == LATEST {
            DEFAULT_REFERENCE.to_string()
        } else {
            version.to_string()
        }
    }
}

/// An explicit name becomes a single directory under the libs directory
fn check_dir_name(name: &str) -> Result<()> {
    let bad = name == "."
        || name == ".."
        || name.contains(&['/', '\\', ':'][..])
        || Path::new(name).is_absolute();
    if bad {
        return Err(ModuleError::InvalidDescriptor(format!(
            "module name {name:?} must be a single path component"
        )));
    }
    Ok(())
}
