//! Version-control capability
//!
//! The sync engine only talks to git through the [`Vcs`] trait. The default
//! implementation, [`SystemGit`], shells out to the `git` binary.

mod git;

pub use git::SystemGit;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by a version-control backend
#[derive(Debug, Error)]
pub enum VcsError {
    /// The command could not be started
    #[error("Failed to run {cmd}: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and reported failure
    #[error("{cmd} failed in {}:\n{output}", dir.display())]
    Failed {
        cmd: String,
        dir: PathBuf,
        output: String,
    },

    /// Backend-specific failure without an underlying command
    #[error("{op} failed in {}: {message}", dir.display())]
    Other {
        op: &'static str,
        dir: PathBuf,
        message: String,
    },
}

/// How a reference is interpreted on checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    Hash,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefKind::Branch => write!(f, "branch"),
            RefKind::Tag => write!(f, "tag"),
            RefKind::Hash => write!(f, "hash"),
        }
    }
}

/// Options for cloning a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// History depth, 0 for a full clone
    pub depth: u32,
    /// Branch, tag or commit hash to clone at; `None` clones the default branch
    pub reference: Option<String>,
}

/// Options for fetching from the origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Also fetch all tags
    pub tags: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { tags: true }
    }
}

/// Git operations the sync engine needs
pub trait Vcs {
    /// Clone `origin` into `dir`, which must be missing or empty
    fn clone_repo(&self, origin: &str, dir: &Path, opts: &CloneOptions) -> Result<(), VcsError>;

    /// Whether the working tree in `dir` has no local modifications relative
    /// to `reference`
    fn is_clean(&self, dir: &Path, reference: &str) -> Result<bool, VcsError>;

    /// Hash of the commit currently checked out
    fn current_hash(&self, dir: &Path) -> Result<String, VcsError>;

    fn does_branch_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError>;

    fn does_tag_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError>;

    fn fetch(&self, dir: &Path, opts: &FetchOptions) -> Result<(), VcsError>;

    fn checkout(&self, dir: &Path, reference: &str, kind: RefKind) -> Result<(), VcsError>;

    fn pull(&self, dir: &Path) -> Result<(), VcsError>;

    /// Discard working tree changes, resetting to `reference`
    fn reset_hard(&self, dir: &Path, reference: &str) -> Result<(), VcsError>;
}

impl<T: Vcs + ?Sized> Vcs for &T {
    fn clone_repo(&self, origin: &str, dir: &Path, opts: &CloneOptions) -> Result<(), VcsError> {
        (**self).clone_repo(origin, dir, opts)
    }

    fn is_clean(&self, dir: &Path, reference: &str) -> Result<bool, VcsError> {
        (**self).is_clean(dir, reference)
    }

    fn current_hash(&self, dir: &Path) -> Result<String, VcsError> {
        (**self).current_hash(dir)
    }

    fn does_branch_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        (**self).does_branch_exist(dir, name)
    }

    fn does_tag_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        (**self).does_tag_exist(dir, name)
    }

    fn fetch(&self, dir: &Path, opts: &FetchOptions) -> Result<(), VcsError> {
        (**self).fetch(dir, opts)
    }

    fn checkout(&self, dir: &Path, reference: &str, kind: RefKind) -> Result<(), VcsError> {
        (**self).checkout(dir, reference, kind)
    }

    fn pull(&self, dir: &Path) -> Result<(), VcsError> {
        (**self).pull(dir)
    }

    fn reset_hard(&self, dir: &Path, reference: &str) -> Result<(), VcsError> {
        (**self).reset_hard(dir, reference)
    }
}

/// Shortest hash prefix accepted as identifying a commit
pub const MIN_HASH_PREFIX: usize = 4;

/// Compare two commit hashes, accepting abbreviated forms
///
/// Case-insensitive; the shorter hash must be a prefix of the longer one and
/// at least [`MIN_HASH_PREFIX`] hex digits long.
pub fn hashes_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.len() < MIN_HASH_PREFIX || !is_hex(short) || !is_hex(long) {
        return false;
    }

    long[..short.len()].eq_ignore_ascii_case(short)
}

/// Whether `s` is syntactically a commit hash
pub fn looks_like_hash(s: &str) -> bool {
    !s.is_empty() && hex::decode(s).is_ok()
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashes_equal_full_and_short() {
        let full = "0123456789abcdef0123456789abcdef01234567";
        assert!(hashes_equal(full, full));
        assert!(hashes_equal(full, "0123456"));
        assert!(hashes_equal("0123456", full));
        assert!(hashes_equal(full, "0123456789ABCDEF"));
    }

    #[test]
    fn test_hashes_not_equal() {
        let full = "0123456789abcdef0123456789abcdef01234567";
        assert!(!hashes_equal(full, "1123456"));
        assert!(!hashes_equal(full, "012"));
        assert!(!hashes_equal(full, "master"));
        assert!(!hashes_equal(full, ""));
    }

    #[test]
    fn test_looks_like_hash() {
        assert!(looks_like_hash("deadbeef"));
        assert!(looks_like_hash("0123456789abcdef0123456789abcdef01234567"));
        assert!(!looks_like_hash("v2.0"));
        assert!(!looks_like_hash("master"));
        assert!(!looks_like_hash(""));
        // hex::decode requires an even number of digits
        assert!(!looks_like_hash("abc"));
    }
}
