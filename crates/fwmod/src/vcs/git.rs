//! `git` command-line backend

use super::{looks_like_hash, CloneOptions, FetchOptions, RefKind, Vcs, VcsError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Remote name used for every clone
const REMOTE: &str = "origin";

/// [`Vcs`] implementation that runs the system `git` binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemGit {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the configured binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command<I, S>(&self, dir: Option<&Path>, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = dir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    fn describe(args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }

    fn output(&self, dir: Option<&Path>, args: &[&str]) -> Result<Output, VcsError> {
        debug!("running {} in {:?}", Self::describe(args), dir);
        self.command(dir, args)
            .output()
            .map_err(|source| VcsError::Spawn {
                cmd: Self::describe(args),
                source,
            })
    }

    /// Run git in `dir` and return trimmed stdout, failing on a non-zero exit
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        let output = self.output(Some(dir), args)?;
        Self::check(dir, args, output)
    }

    /// Turn a finished command into its trimmed stdout, or a failure that
    /// names `dir`
    fn check(dir: &Path, args: &[&str], output: Output) -> Result<String, VcsError> {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message = String::new();
            if !stdout.is_empty() {
                message.push_str(&format!("stdout: {stdout}"));
            }
            if !stderr.is_empty() {
                message.push_str(&format!("stderr: {stderr}"));
            }
            return Err(VcsError::Failed {
                cmd: Self::describe(args),
                dir: dir.to_path_buf(),
                output: message.trim_end().to_string(),
            });
        }

        Ok(stdout.trim_end().to_string())
    }

    /// Run git and report only whether it succeeded
    fn probe(&self, dir: &Path, args: &[&str]) -> Result<bool, VcsError> {
        Ok(self.output(Some(dir), args)?.status.success())
    }

    fn ref_exists(&self, dir: &Path, full_ref: &str) -> Result<bool, VcsError> {
        self.probe(dir, &["show-ref", "--verify", "--quiet", full_ref])
    }

    fn has_commit(&self, dir: &Path, hash: &str) -> Result<bool, VcsError> {
        let object = format!("{hash}^{{commit}}");
        self.probe(dir, &["cat-file", "-e", object.as_str()])
    }

    /// Make `hash` available in a shallow clone
    ///
    /// Fetches the commit itself first. Servers that refuse fetching by hash,
    /// and abbreviated hashes, fall back to fetching the full history.
    fn fetch_commit(&self, dir: &Path, hash: &str, depth: u32) -> Result<(), VcsError> {
        if self.has_commit(dir, hash)? {
            return Ok(());
        }

        let depth = format!("--depth={depth}");
        match self.run(dir, &["fetch", "--quiet", depth.as_str(), REMOTE, hash]) {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("cannot fetch {} directly, fetching full history: {}", hash, e);
                let shallow = self.run(dir, &["rev-parse", "--is-shallow-repository"])?;
                if shallow != "true" {
                    return Err(e);
                }
                self.run(dir, &["fetch", "--quiet", "--unshallow", "--tags", REMOTE])
                    .map(|_| ())
            }
        }
    }
}

impl Vcs for SystemGit {
    fn clone_repo(&self, origin: &str, dir: &Path, opts: &CloneOptions) -> Result<(), VcsError> {
        let depth = opts.depth.to_string();
        let target = dir.to_string_lossy().into_owned();

        // `--branch` only takes branch and tag names; a shallow clone pinned
        // to a commit fetches that commit after cloning.
        let pinned_hash = opts
            .reference
            .as_deref()
            .filter(|r| opts.depth > 0 && looks_like_hash(r));

        let mut args = vec!["clone", "--origin", REMOTE];
        if opts.depth > 0 {
            args.extend(["--depth", depth.as_str(), "--no-single-branch"]);
        }
        if let Some(reference) = opts.reference.as_deref().filter(|_| pinned_hash.is_none()) {
            args.extend(["--branch", reference]);
        }
        args.extend(["--", origin, target.as_str()]);

        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| VcsError::Other {
                op: "clone",
                dir: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let output = self.output(None, &args)?;
        Self::check(dir, &args, output)?;

        match pinned_hash {
            Some(hash) => self.fetch_commit(dir, hash, opts.depth),
            None => Ok(()),
        }
    }

    fn is_clean(&self, dir: &Path, reference: &str) -> Result<bool, VcsError> {
        let status = self.run(dir, &["status", "--porcelain"])?;
        if !status.is_empty() {
            debug!("{:?} has local modifications:\n{}", dir, status);
            return Ok(false);
        }

        // Unpushed commits on a tracked branch count as local edits too.
        let local = format!("refs/heads/{reference}");
        let remote = format!("refs/remotes/{REMOTE}/{reference}");
        if self.ref_exists(dir, &local)? && self.ref_exists(dir, &remote)? {
            let range = format!("{remote}..{local}");
            let ahead = self.run(dir, &["rev-list", "--count", range.as_str()])?;
            if ahead != "0" {
                debug!("{:?}: {} has {} unpushed commit(s)", dir, reference, ahead);
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn current_hash(&self, dir: &Path) -> Result<String, VcsError> {
        self.run(dir, &["rev-parse", "HEAD"])
    }

    fn does_branch_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        Ok(self.ref_exists(dir, &format!("refs/heads/{name}"))?
            || self.ref_exists(dir, &format!("refs/remotes/{REMOTE}/{name}"))?)
    }

    fn does_tag_exist(&self, dir: &Path, name: &str) -> Result<bool, VcsError> {
        self.ref_exists(dir, &format!("refs/tags/{name}"))
    }

    fn fetch(&self, dir: &Path, opts: &FetchOptions) -> Result<(), VcsError> {
        let mut args = vec!["fetch", REMOTE];
        if opts.tags {
            args.push("--tags");
        }
        self.run(dir, &args).map(|_| ())
    }

    fn checkout(&self, dir: &Path, reference: &str, kind: RefKind) -> Result<(), VcsError> {
        let target = match kind {
            RefKind::Branch => {
                if !self.ref_exists(dir, &format!("refs/heads/{reference}"))? {
                    let upstream = format!("{REMOTE}/{reference}");
                    return self
                        .run(dir, &["checkout", "--quiet", "--track", upstream.as_str()])
                        .map(|_| ());
                }
                reference.to_string()
            }
            RefKind::Tag => format!("refs/tags/{reference}"),
            RefKind::Hash => reference.to_string(),
        };

        let mut args = vec!["checkout", "--quiet"];
        if kind != RefKind::Branch {
            args.push("--detach");
        }
        args.extend([target.as_str(), "--"]);
        self.run(dir, &args).map(|_| ())
    }

    fn pull(&self, dir: &Path) -> Result<(), VcsError> {
        self.run(dir, &["pull", "--ff-only", "--quiet"]).map(|_| ())
    }

    fn reset_hard(&self, dir: &Path, reference: &str) -> Result<(), VcsError> {
        let target = if self.ref_exists(dir, &format!("refs/heads/{reference}"))? {
            reference.to_string()
        } else {
            // Tags and hashes are checked out detached; HEAD already points
            // at the requested commit.
            "HEAD".to_string()
        };
        self.run(dir, &["reset", "--hard", "--quiet", target.as_str(), "--"])
            .map(|_| ())
    }
}
