//! # System Git Helpers
//!
//! Thin wrappers around the system `git` command. Using the installed git
//! client (instead of an in-process implementation) means authentication
//! works out of the box:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Cloning is performed as `init` + `remote add` + `fetch` + checkout
//! rather than `git clone`: `git clone` refuses to run in a non-empty
//! directory, which the checkout root often is after an interrupted clone
//! or once the host build tool has dropped bookkeeping files into it. The
//! init sequence is idempotent and resumes cleanly from partial state.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};

/// The remote name all checkouts are synchronized against.
pub const REMOTE: &str = "origin";

fn run(dir: &Path, args: &[&str]) -> Result<Output> {
    log::debug!("running `git {}` in {}", args.join(" "), dir.display());
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            stderr: e.to_string(),
        })
}

fn run_checked(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run(dir, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stderr = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                For private repos, ensure you have:\n\
                - SSH key added to ssh-agent\n\
                - Git credentials configured\n\
                - Personal access token set up\n\
                Error: {}",
                stderr
            )
        } else {
            stderr
        };
        return Err(Error::GitCommand {
            command: args.join(" "),
            stderr,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether `dir` looks like a git work tree (has a `.git` entry).
pub fn is_work_tree(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Initialize an empty repository in `dir`. Idempotent.
pub fn init(dir: &Path) -> Result<()> {
    run_checked(dir, &["init"]).map(|_| ())
}

/// Point the `origin` remote at `uri`, creating or re-targeting it.
pub fn set_remote(dir: &Path, uri: &str) -> Result<()> {
    if remote_url(dir).is_ok() {
        run_checked(dir, &["remote", "set-url", REMOTE, uri]).map(|_| ())
    } else {
        run_checked(dir, &["remote", "add", REMOTE, uri]).map(|_| ())
    }
}

/// The fetch URL of the `origin` remote.
pub fn remote_url(dir: &Path) -> Result<String> {
    run_checked(dir, &["remote", "get-url", REMOTE])
}

/// Fetch all branches and tags from `origin`.
pub fn fetch(dir: &Path) -> Result<()> {
    run_checked(dir, &["fetch", "--tags", REMOTE]).map(|_| ())
}

/// Check out `branch` as a local tracking branch reset to the remote tip,
/// creating it when absent.
pub fn checkout_branch(dir: &Path, branch: &str) -> Result<()> {
    let remote_ref = format!("{}/{}", REMOTE, branch);
    run_checked(dir, &["checkout", "-B", branch, &remote_ref]).map(|_| ())
}

/// Detached checkout of a tag name or commit hash.
pub fn checkout_detached(dir: &Path, rev: &str) -> Result<()> {
    run_checked(dir, &["checkout", "--detach", rev]).map(|_| ())
}

/// The branch HEAD points at, or `None` for a detached HEAD.
pub fn current_branch(dir: &Path) -> Result<Option<String>> {
    let output = run(dir, &["symbolic-ref", "--short", "-q", "HEAD"])?;
    if output.status.success() {
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    } else {
        Ok(None)
    }
}

/// The commit hash HEAD resolves to.
pub fn head_commit(dir: &Path) -> Result<String> {
    run_checked(dir, &["rev-parse", "HEAD"])
}

/// The remote's default branch name.
pub fn default_branch(dir: &Path) -> Result<String> {
    run_checked(dir, &["remote", "set-head", REMOTE, "--auto"])?;
    let full = run_checked(
        dir,
        &["symbolic-ref", "--short", &format!("refs/remotes/{}/HEAD", REMOTE)],
    )?;
    let prefix = format!("{}/", REMOTE);
    Ok(full.strip_prefix(&prefix).unwrap_or(&full).to_string())
}
