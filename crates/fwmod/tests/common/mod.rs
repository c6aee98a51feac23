//! Scripted version-control backend shared by the integration tests

#![allow(dead_code)]

use fwmod::{CloneOptions, FetchOptions, RefKind, Vcs, VcsError};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const HEAD_HASH: &str = "4e1243bd22c66e76c2ba9eddc1f91394e57f9f83";

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clone { depth: u32, reference: Option<String> },
    IsClean(String),
    CurrentHash,
    BranchExists(String),
    TagExists(String),
    Fetch,
    Checkout(String, RefKind),
    Pull,
    ResetHard(String),
}

#[derive(Debug, Default)]
struct State {
    branches: HashSet<String>,
    tags: HashSet<String>,
    /// Refs that only become visible after a fetch
    remote_branches: HashSet<String>,
    remote_tags: HashSet<String>,
    head: String,
    dirty: bool,
    /// Delete the working directory whenever a failure is injected
    remove_dir_on_failure: bool,
    /// Remaining injected failures per operation name
    failures: HashMap<&'static str, u32>,
    calls: Vec<Call>,
}

/// In-memory stand-in for git
///
/// Cloning creates `.git` and a `README` inside the target directory so the
/// sync engine's filesystem probes see a real checkout.
pub struct ScriptedVcs {
    state: RefCell<State>,
}

impl Default for ScriptedVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedVcs {
    pub fn new() -> Self {
        let state = State {
            branches: ["master".to_string()].into_iter().collect(),
            head: HEAD_HASH.to_string(),
            ..Default::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn with_branch(self, name: &str) -> Self {
        self.state.borrow_mut().branches.insert(name.to_string());
        self
    }

    pub fn with_tag(self, name: &str) -> Self {
        self.state.borrow_mut().tags.insert(name.to_string());
        self
    }

    pub fn with_remote_branch(self, name: &str) -> Self {
        self.state.borrow_mut().remote_branches.insert(name.to_string());
        self
    }

    pub fn with_remote_tag(self, name: &str) -> Self {
        self.state.borrow_mut().remote_tags.insert(name.to_string());
        self
    }

    pub fn dirty(self) -> Self {
        self.state.borrow_mut().dirty = true;
        self
    }

    /// Remove the whole target directory along with each injected failure,
    /// so the following cleanup cannot read it
    pub fn removing_dir_on_failure(self) -> Self {
        self.state.borrow_mut().remove_dir_on_failure = true;
        self
    }

    /// Make `op` fail the next `times` calls
    pub fn failing(self, op: &'static str, times: u32) -> Self {
        self.state.borrow_mut().failures.insert(op, times);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, op: &'static str, dir: &Path, call: Call) -> Result<(), VcsError> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.calls.push(call);

        if let Some(remaining) = state.failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                if state.remove_dir_on_failure {
                    let _ = std::fs::remove_dir_all(dir);
                }
                return Err(VcsError::Other {
                    op,
                    dir: dir.to_path_buf(),
                    message: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Vcs for ScriptedVcs {
    fn clone_repo(&self, _origin: &str, dir: &Path, opts: &CloneOptions) -> Result<(), VcsError> {
        self.record(
            "clone",
            dir,
            Call::Clone {
                depth: opts.depth,
                reference: opts.reference.clone(),
            },
        )?;

        let io = |e: std::io::Error| VcsError::Other {
            op: "clone",
            dir: dir.to_path_buf(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(dir.join(".git")).map_err(io)?;
        std::fs::write(dir.join("README"), "hello\n").map_err(io)?;
        self.state.borrow_mut().dirty = false;
        Ok(())
    }

    fn is_clean(&self, dir: &Path, reference: &str) -> Result<bool, VcsError> {
        self.record("is_clean", dir, Call::IsClean(reference.to_string()))?;
        Ok(!self.state.borrow().dirty)
    }

    fn current_hash(&self, dir: &Path) -> Result<String, VcsError> {
        self.record("current_hash", dir, Call::CurrentHash)?;
        Ok(self.state.borrow().head.clone())
    }

    fn does_branch_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        self.record("branch_exists", dir, Call::BranchExists(name.to_string()))?;
        Ok(self.state.borrow().branches.contains(name))
    }

    fn does_tag_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        self.record("tag_exists", dir, Call::TagExists(name.to_string()))?;
        Ok(self.state.borrow().tags.contains(name))
    }

    fn fetch(&self, dir: &Path, _opts: &FetchOptions) -> Result<(), VcsError> {
        self.record("fetch", dir, Call::Fetch)?;
        let mut state = self.state.borrow_mut();
        let branches: Vec<_> = state.remote_branches.drain().collect();
        let tags: Vec<_> = state.remote_tags.drain().collect();
        state.branches.extend(branches);
        state.tags.extend(tags);
        Ok(())
    }

    fn checkout(&self, dir: &Path, reference: &str, kind: RefKind) -> Result<(), VcsError> {
        self.record("checkout", dir, Call::Checkout(reference.to_string(), kind))
    }

    fn pull(&self, dir: &Path) -> Result<(), VcsError> {
        self.record("pull", dir, Call::Pull)
    }

    fn reset_hard(&self, dir: &Path, reference: &str) -> Result<(), VcsError> {
        self.record("reset", dir, Call::ResetHard(reference.to_string()))
    }
}

/// Fake checkout: a directory with `.git` and one tracked file
pub fn fake_checkout(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir.join(".git")).unwrap();
    std::fs::write(dir.join("README"), "hello\n").unwrap();
    dir.to_path_buf()
}

/// Sorted list of entries directly inside `dir`
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
