//! Per-module materialization
//!
//! Ties descriptor resolution, path computation and synchronization
//! together, and remembers every resolved path in a [`PathCache`] so a
//! module is synchronized at most once per libs directory.

use crate::clean;
use crate::descriptor::{ModuleDescriptor, ModuleKind};
use crate::error::Result;
use crate::path::local_dir;
use crate::sync::{SyncEngine, SyncOptions, SyncOutcome};
use crate::vcs::Vcs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolved local paths keyed by descriptor and libs directory
///
/// Entries are written once; inserting again for the same key keeps the
/// first path.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    entries: HashMap<(ModuleDescriptor, PathBuf), PathBuf>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously resolved path of `d` under `libs_dir`
    pub fn get(&self, d: &ModuleDescriptor, libs_dir: &Path) -> Option<&Path> {
        self.entries
            .get(&(d.clone(), libs_dir.to_path_buf()))
            .map(PathBuf::as_path)
    }

    /// Record a resolved path, returning the path now stored for the key
    pub fn insert(&mut self, d: &ModuleDescriptor, libs_dir: &Path, path: PathBuf) -> &Path {
        self.entries
            .entry((d.clone(), libs_dir.to_path_buf()))
            .or_insert(path)
            .as_path()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All resolved entries as `(descriptor, libs dir, path)`
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleDescriptor, &Path, &Path)> {
        self.entries
            .iter()
            .map(|((d, libs), path)| (d, libs.as_path(), path.as_path()))
    }
}

/// Resolves modules to local directories, synchronizing remote ones
pub struct Materializer<V> {
    engine: SyncEngine<V>,
    libs_dir: PathBuf,
    default_version: String,
    options: SyncOptions,
    cache: PathCache,
}

impl<V: Vcs> Materializer<V> {
    /// Create a materializer placing remote modules under `libs_dir`
    pub fn new(vcs: V, libs_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine: SyncEngine::new(vcs),
            libs_dir: libs_dir.into(),
            default_version: String::new(),
            options: SyncOptions::default(),
            cache: PathCache::new(),
        }
    }

    /// Version used for modules that do not request one
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn libs_dir(&self) -> &Path {
        &self.libs_dir
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Local directory of `d`, without touching the filesystem
    pub fn local_dir(&self, d: &ModuleDescriptor) -> Result<PathBuf> {
        local_dir(d, &self.libs_dir, &self.default_version)
    }

    /// Whether the local copy of `d` may be updated
    pub fn is_clean(&self, d: &ModuleDescriptor) -> Result<bool> {
        clean::is_clean(d, &self.libs_dir, &self.default_version, self.engine.vcs())
    }

    /// Make sure `d` is available locally and return its directory
    ///
    /// Remote modules are cloned or updated; local ones are only located.
    /// The first successful result for a descriptor is returned unchanged by
    /// later calls.
    pub fn prepare_local_dir(&mut self, d: &ModuleDescriptor) -> Result<PathBuf> {
        if let Some(path) = self.cache.get(d, &self.libs_dir) {
            debug!("{:?} already prepared at {:?}", d.location, path);
            return Ok(path.to_path_buf());
        }

        let dir = self.local_dir(d)?;

        if d.kind() == ModuleKind::RemoteRepo {
            let reference = d.resolved_reference(&self.default_version);
            let outcome =
                self.engine
                    .materialize_git_copy(&d.location, &reference, &dir, &self.options)?;
            match outcome {
                SyncOutcome::Converged => info!("{} is at {}", d.name()?, reference),
                SyncOutcome::LeftDirty | SyncOutcome::LeftForeign => {
                    info!("{} left as is in {:?}", d.name()?, dir)
                }
            }
        }

        Ok(self.cache.insert(d, &self.libs_dir, dir).to_path_buf())
    }
}
