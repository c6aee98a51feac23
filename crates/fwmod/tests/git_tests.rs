//! End-to-end tests against the system `git` binary
//!
//! Each test builds a throwaway origin repository. Tests return early when
//! no `git` executable is available.

use fwmod::{SyncEngine, SyncOptions, SyncOutcome, SystemGit, Vcs};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=fwmod",
            "-c",
            "user.email=fwmod@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(repo: &Path, name: &str, content: &str, message: &str) -> String {
    fs::write(repo.join(name), content).unwrap();
    git(repo, &["add", name]);
    git(repo, &["commit", "-q", "-m", message]);
    git(repo, &["rev-parse", "HEAD"])
}

struct Origin {
    _temp: TempDir,
    path: PathBuf,
    v1: String,
}

impl Origin {
    /// Repository with a `v1.0` tag and one more commit on `master`
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("origin");
        fs::create_dir_all(&path).unwrap();
        git(&path, &["init", "-q"]);
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        let v1 = commit_file(&path, "lib.c", "int v = 1;\n", "v1");
        git(&path, &["tag", "v1.0"]);
        commit_file(&path, "lib.c", "int v = 2;\n", "v2");

        Self {
            _temp: temp,
            path,
            v1,
        }
    }

    fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// `file://` URL, so clone options like `--depth` are honored
    fn file_url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    fn head(&self, reference: &str) -> String {
        git(&self.path, &["rev-parse", reference])
    }
}

fn system_git() -> Option<SystemGit> {
    let vcs = SystemGit::new();
    vcs.is_available().then_some(vcs)
}

#[test]
fn test_clone_tag_and_repeat() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib-v1.0");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions::default();

    let outcome = engine
        .materialize_git_copy(&origin.url(), "v1.0", &target, &opts)
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Converged);
    assert_eq!(engine.vcs().current_hash(&target).unwrap(), origin.v1);
    let content = fs::read_to_string(target.join("lib.c")).unwrap();
    assert_eq!(content, "int v = 1;\n");

    let outcome = engine
        .materialize_git_copy(&origin.url(), "v1.0", &target, &opts)
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Converged);
    assert_eq!(engine.vcs().current_hash(&target).unwrap(), origin.v1);
    assert_eq!(fs::read_to_string(target.join("lib.c")).unwrap(), content);
}

#[test]
fn test_dirty_tree_is_preserved() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions {
        allow_destructive_retry: true,
        ..Default::default()
    };

    engine
        .materialize_git_copy(&origin.url(), "master", &target, &opts)
        .unwrap();
    fs::write(target.join("lib.c"), "int v = 42;\n").unwrap();
    assert!(!engine.vcs().is_clean(&target, "master").unwrap());

    let outcome = engine
        .materialize_git_copy(&origin.url(), "v1.0", &target, &opts)
        .unwrap();

    assert_eq!(outcome, SyncOutcome::LeftDirty);
    assert_eq!(fs::read_to_string(target.join("lib.c")).unwrap(), "int v = 42;\n");
    assert_eq!(
        engine.vcs().current_hash(&target).unwrap(),
        origin.head("master")
    );
}

#[test]
fn test_checkout_hash() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);

    engine
        .materialize_git_copy(&origin.url(), &origin.v1, &target, &SyncOptions::default())
        .unwrap();

    assert_eq!(engine.vcs().current_hash(&target).unwrap(), origin.v1);
}

#[test]
fn test_new_branch_is_fetched() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions::default();

    engine
        .materialize_git_copy(&origin.url(), "master", &target, &opts)
        .unwrap();

    git(&origin.path, &["checkout", "-q", "-b", "feature"]);
    let feature = commit_file(&origin.path, "feature.c", "void f(void);\n", "feature");
    git(&origin.path, &["checkout", "-q", "master"]);

    engine
        .materialize_git_copy(&origin.url(), "feature", &target, &opts)
        .unwrap();

    assert_eq!(engine.vcs().current_hash(&target).unwrap(), feature);
    assert!(target.join("feature.c").exists());
}

#[test]
fn test_stale_branch_is_pulled() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions::default();

    engine
        .materialize_git_copy(&origin.url(), "master", &target, &opts)
        .unwrap();
    let latest = commit_file(&origin.path, "lib.c", "int v = 3;\n", "v3");

    // Within the pull interval nothing is fetched
    engine
        .materialize_git_copy(&origin.url(), "master", &target, &opts)
        .unwrap();
    assert_ne!(engine.vcs().current_hash(&target).unwrap(), latest);

    let week_ago = SystemTime::now() - Duration::from_secs(7 * 24 * 3600);
    fs::File::open(&target).unwrap().set_modified(week_ago).unwrap();

    engine
        .materialize_git_copy(&origin.url(), "master", &target, &opts)
        .unwrap();
    assert_eq!(engine.vcs().current_hash(&target).unwrap(), latest);
}

#[test]
fn test_unknown_reference_fails() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);

    let err = engine
        .materialize_git_copy(&origin.url(), "no-such-branch", &target, &SyncOptions::default())
        .unwrap_err();

    assert!(matches!(err, fwmod::ModuleError::AmbiguousReference { .. }));
}

#[test]
fn test_shallow_clone_at_hash() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions {
        clone_depth: 1,
        allow_destructive_retry: true,
        ..Default::default()
    };

    let outcome = engine
        .materialize_git_copy(&origin.file_url(), &origin.v1, &target, &opts)
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Converged);
    assert_eq!(engine.vcs().current_hash(&target).unwrap(), origin.v1);
    assert_eq!(fs::read_to_string(target.join("lib.c")).unwrap(), "int v = 1;\n");
}

#[test]
fn test_shallow_clone_at_branch() {
    let Some(vcs) = system_git() else { return };
    let origin = Origin::new();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("lib");
    let engine = SyncEngine::new(vcs);
    let opts = SyncOptions {
        clone_depth: 1,
        ..Default::default()
    };

    engine
        .materialize_git_copy(&origin.file_url(), "master", &target, &opts)
        .unwrap();

    assert_eq!(
        engine.vcs().current_hash(&target).unwrap(),
        origin.head("master")
    );
}
