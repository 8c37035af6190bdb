//! Git transport
//!
//! This uses the system git command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Repositories are kept in the cache as bare mirrors. A pinned commit is
//! materialized by cloning from the local mirror and detaching at the commit,
//! so the network is only touched when the mirror is created or lacks the
//! commit.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// Create a bare mirror of `url` at `mirror_dir`
pub fn clone_mirror(url: &str, mirror_dir: &Path) -> Result<()> {
    if let Some(parent) = mirror_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }

    debug!("git clone --mirror {} {}", url, mirror_dir.display());
    run(
        url,
        Command::new("git")
            .args(["clone", "--mirror", "--quiet", "--", url])
            .arg(mirror_dir),
    )
}

/// Update every ref of an existing mirror
pub fn fetch(url: &str, mirror_dir: &Path) -> Result<()> {
    debug!("git fetch {} in {}", url, mirror_dir.display());
    run(
        url,
        Command::new("git")
            .arg("--git-dir")
            .arg(mirror_dir)
            .args(["fetch", "--quiet", "--prune", "origin"]),
    )
}

/// Whether the repository at `git_dir` contains `commit`
pub fn has_commit(git_dir: &Path, commit: &str) -> bool {
    if commit.starts_with('-') {
        return false;
    }
    Command::new("git")
        .arg("--git-dir")
        .arg(git_dir)
        .args(["cat-file", "-e"])
        .arg(format!("{}^{{commit}}", commit))
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Clone the local mirror into `target_dir` and detach at `commit`.
///
/// `target_dir` must not exist or be empty.
pub fn checkout(mirror_dir: &Path, commit: &str, target_dir: &Path) -> Result<()> {
    let mirror = mirror_dir.to_string_lossy();
    if commit.starts_with('-') {
        return Err(Error::Transport {
            url: mirror.into_owned(),
            message: format!("invalid commit {:?}", commit),
        });
    }

    debug!("checking out {} into {}", commit, target_dir.display());
    run(
        &mirror,
        Command::new("git")
            .args(["clone", "--quiet", "--no-checkout", "--"])
            .arg(mirror_dir)
            .arg(target_dir),
    )?;
    run(
        &mirror,
        Command::new("git")
            .arg("-C")
            .arg(target_dir)
            .args(["checkout", "--quiet", "--detach", commit]),
    )
}

fn run(url: &str, command: &mut Command) -> Result<()> {
    let output = command.output().map_err(|e| Error::Transport {
        url: url.to_string(),
        message: format!("failed to run git: {}", e),
    })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);

    // Provide helpful error message for common auth failures
    let message = if stderr.contains("Authentication failed")
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
            stderr.trim()
        )
    } else {
        format!(
            "git {} failed: {}",
            command
                .get_args()
                .map(OsStr::to_string_lossy)
                .collect::<Vec<_>>()
                .join(" "),
            stderr.trim()
        )
    };

    Err(Error::Transport {
        url: url.to_string(),
        message,
    })
}
