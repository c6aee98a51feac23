//! Git working copy synchronization
//!
//! [`SyncEngine::materialize_git_copy`] brings a directory to a requested
//! branch, tag or commit. It never touches a directory it does not own:
//!
//! - a missing or empty directory is cloned into
//! - a non-empty directory without `.git` is left intact
//! - a repository with local modifications is left intact
//!
//! Leaving a directory intact is a success, reported through
//! [`SyncOutcome`] and the log. When destructive retry is enabled, a failure
//! while converging an owned repository wipes the directory and runs the
//! whole procedure once more.

use crate::error::{ModuleError, Result};
use crate::vcs::{hashes_equal, looks_like_hash, CloneOptions, FetchOptions, RefKind, Vcs};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// Directory whose presence marks a git working copy
pub const GIT_METADATA_DIR: &str = ".git";

/// Default interval between pulls of the same branch checkout
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Tuning for a single materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Wipe and reclone once if converging an existing copy fails
    pub allow_destructive_retry: bool,
    /// Branch checkouts modified more recently than this are not pulled
    pub pull_interval: Duration,
    /// Clone depth; 0 clones the full history
    pub clone_depth: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            allow_destructive_retry: false,
            pull_interval: DEFAULT_PULL_INTERVAL,
            clone_depth: 0,
        }
    }
}

/// How a materialization ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The working copy is at the requested reference
    Converged,
    /// The directory holds files that are not a git repository
    LeftForeign,
    /// The repository has local modifications
    LeftDirty,
}

impl SyncOutcome {
    /// Whether the directory was deliberately left as it was
    pub fn is_untouched(self) -> bool {
        !matches!(self, SyncOutcome::Converged)
    }
}

/// What the target directory currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirState {
    NeedsClone,
    ExistingRepo,
    ForeignNonEmpty,
}

/// Drives a git working copy to a requested reference
#[derive(Debug, Clone)]
pub struct SyncEngine<V> {
    vcs: V,
}

impl<V: Vcs> SyncEngine<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    /// The version-control backend
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Materialize `origin` at `reference` in `target_dir`
    ///
    /// `reference` must already be resolved (no empty or `latest`).
    pub fn materialize_git_copy(
        &self,
        origin: &str,
        reference: &str,
        target_dir: &Path,
        opts: &SyncOptions,
    ) -> Result<SyncOutcome> {
        let max_attempts = if opts.allow_destructive_retry { 2 } else { 1 };
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.prepare(origin, reference, target_dir, opts.clone_depth)? {
                DirState::ForeignNonEmpty => {
                    info!(
                        "{:?} is not empty, but is not a git repository either, leaving it intact",
                        target_dir
                    );
                    return Ok(SyncOutcome::LeftForeign);
                }
                DirState::ExistingRepo if !self.vcs.is_clean(target_dir, reference)? => {
                    info!("Repository {:?} is dirty, leaving it intact", target_dir);
                    return Ok(SyncOutcome::LeftDirty);
                }
                _ => {}
            }

            match self.converge(origin, reference, target_dir, opts.pull_interval) {
                Ok(()) => return Ok(SyncOutcome::Converged),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    warn!("{}", e);
                    debug!("removing everything under {:?} and starting over", target_dir);
                    wipe_dir(target_dir);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Probe the target directory and clone into it if needed
    ///
    /// Returns the state found before cloning. A fresh clone needs no dirty
    /// check, so it is reported as `NeedsClone`.
    fn prepare(
        &self,
        origin: &str,
        reference: &str,
        target_dir: &Path,
        clone_depth: u32,
    ) -> Result<DirState> {
        let state = probe_dir(target_dir)?;
        if state != DirState::NeedsClone {
            return Ok(state);
        }

        info!("Repository {:?} does not exist, cloning {}...", target_dir, origin);
        // Only a shallow clone is pinned to the reference; a full clone of the
        // default branch followed by a local checkout is cheaper otherwise.
        let clone_opts = CloneOptions {
            depth: clone_depth,
            reference: (clone_depth > 0).then(|| reference.to_string()),
        };
        self.vcs.clone_repo(origin, target_dir, &clone_opts)?;

        Ok(state)
    }

    /// Steps covered by destructive retry: checkout, pull and reset
    fn converge(
        &self,
        origin: &str,
        reference: &str,
        target_dir: &Path,
        pull_interval: Duration,
    ) -> Result<()> {
        let cur_hash = self.vcs.current_hash(target_dir)?;
        debug!("hash: {:?}", cur_hash);

        if hashes_equal(&cur_hash, reference) {
            debug!("hashes are equal {:?}, {:?}", cur_hash, reference);
            return Ok(());
        }

        let kind = self.classify(origin, reference, target_dir)?;

        debug!("checking out {} {:?}", kind, reference);
        self.vcs.checkout(target_dir, reference, kind)?;

        if kind == RefKind::Branch {
            self.pull_if_stale(target_dir, pull_interval)?;
        } else {
            debug!("requested version {:?} is not a branch, skip pulling", reference);
        }

        debug!("resetting {:?} to {:?}", target_dir, reference);
        self.vcs.reset_hard(target_dir, reference)?;

        Ok(())
    }

    /// Decide whether `reference` is a branch, a tag or a hash, fetching
    /// once if it is not known locally
    fn classify(&self, origin: &str, reference: &str, target_dir: &Path) -> Result<RefKind> {
        let mut kind = self.known_ref_kind(target_dir, reference)?;

        if kind.is_none() {
            debug!("neither branch nor tag {:?} exists, fetching from {}", reference, origin);
            self.vcs.fetch(target_dir, &FetchOptions::default())?;
            kind = self.known_ref_kind(target_dir, reference)?;
        }

        match kind {
            Some(kind) => Ok(kind),
            None if looks_like_hash(reference) => {
                debug!("{:?} is neither a branch nor a tag, assume it's a hash", reference);
                Ok(RefKind::Hash)
            }
            None => Err(ModuleError::AmbiguousReference {
                reference: reference.to_string(),
                dir: target_dir.to_path_buf(),
            }),
        }
    }

    fn known_ref_kind(&self, target_dir: &Path, reference: &str) -> Result<Option<RefKind>> {
        let branch_exists = self.vcs.does_branch_exist(target_dir, reference)?;
        debug!("branch {:?} exists={}", reference, branch_exists);
        if branch_exists {
            return Ok(Some(RefKind::Branch));
        }

        let tag_exists = self.vcs.does_tag_exist(target_dir, reference)?;
        debug!("tag {:?} exists={}", reference, tag_exists);
        Ok(tag_exists.then_some(RefKind::Tag))
    }

    /// Pull unless the checkout was refreshed within `pull_interval`
    fn pull_if_stale(&self, target_dir: &Path, pull_interval: Duration) -> Result<()> {
        let modified = fs::metadata(target_dir)
            .and_then(|m| m.modified())
            .map_err(|e| ModuleError::io("stat", target_dir, e))?;

        if !is_stale(modified, pull_interval, SystemTime::now()) {
            info!("Repository {:?} is updated recently enough, don't touch it", target_dir);
            return Ok(());
        }

        debug!("pulling {:?}", target_dir);
        self.vcs.pull(target_dir)?;
        touch_dir(target_dir)
    }
}

/// Whether something last modified at `modified` is older than `interval`
fn is_stale(modified: SystemTime, interval: Duration, now: SystemTime) -> bool {
    match modified.checked_add(interval) {
        Some(deadline) => deadline < now,
        None => false,
    }
}

/// Set the directory's modification time to now
fn touch_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|f| f.set_modified(SystemTime::now()))
        .map_err(|e| ModuleError::io("update modification time of", dir, e))
}

fn probe_dir(target_dir: &Path) -> Result<DirState> {
    match fs::metadata(target_dir) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DirState::NeedsClone),
        Err(e) => return Err(ModuleError::io("stat", target_dir, e)),
    }

    let git_dir = target_dir.join(GIT_METADATA_DIR);
    match fs::symlink_metadata(&git_dir) {
        Ok(_) => return Ok(DirState::ExistingRepo),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(ModuleError::io("stat", git_dir, e)),
    }

    let mut entries =
        fs::read_dir(target_dir).map_err(|e| ModuleError::io("read directory", target_dir, e))?;
    if entries.next().is_some() {
        Ok(DirState::ForeignNonEmpty)
    } else {
        Ok(DirState::NeedsClone)
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself
///
/// Failures are logged; the caller retries regardless.
fn wipe_dir(dir: &Path) {
    wipe_dir_with(dir, remove_entry)
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn wipe_dir_with(dir: &Path, remove: impl Fn(&Path, bool) -> io::Result<()>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("failed to read {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("failed to read an entry of {:?}: {}", dir, e);
                continue;
            }
        };

        let path = entry.path();
        debug!("removing {:?}", path);
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if let Err(e) = remove(&path, is_dir) {
            error!("failed to remove {:?}: {}", path, e);
        }
    }
}
