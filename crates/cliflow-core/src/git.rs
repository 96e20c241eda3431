//! Git repository detection and state fingerprinting.
//!
//! Detection only reads files under `.git`, so it is cheap enough to run for
//! every request. The fingerprint shells out to `git status` and is only
//! computed when a generator's cache policy asks for it.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

const STATUS_TIMEOUT: Duration = Duration::from_secs(1);

/// Repository state of a working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitState {
    /// Whether the directory is inside a work tree
    pub is_repo: bool,
    /// Work tree root
    pub root: Option<PathBuf>,
    /// Resolved git directory (differs from `root/.git` for worktrees)
    pub git_dir: Option<PathBuf>,
    /// Checked-out branch; `None` when detached or not a repository
    pub branch: Option<String>,
}

impl GitState {
    /// Walk up from `cwd` looking for a `.git` directory or gitdir file.
    #[must_use]
    pub fn detect(cwd: &Path) -> Self {
        for dir in cwd.ancestors() {
            let candidate = dir.join(".git");
            let git_dir = if candidate.is_dir() {
                candidate
            } else if candidate.is_file() {
                match read_gitdir_file(&candidate, dir) {
                    Some(path) => path,
                    None => continue,
                }
            } else {
                continue;
            };

            let branch = fs::read_to_string(git_dir.join("HEAD"))
                .ok()
                .and_then(|head| parse_head_branch(&head));

            return Self {
                is_repo: true,
                root: Some(dir.to_path_buf()),
                git_dir: Some(git_dir),
                branch,
            };
        }
        Self::default()
    }
}

/// Follow a worktree `.git` file (`gitdir: <path>`).
fn read_gitdir_file(file: &Path, base: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(file).ok()?;
    let target = content.trim().strip_prefix("gitdir:")?.trim();
    let path = Path::new(target);
    Some(if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    })
}

fn parse_head_branch(head: &str) -> Option<String> {
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(ToString::to_string)
}

/// Fingerprint of the repository state (HEAD plus dirty files).
///
/// Hashes the output of `git status --porcelain=v2 --branch`. If git cannot be
/// run, falls back to hashing HEAD and the ref it points at, which still
/// tracks commits and branch switches. Returns `None` outside a repository.
#[instrument(level = "debug", skip(state))]
pub async fn fingerprint(cwd: &Path, state: &GitState) -> Option<String> {
    if !state.is_repo {
        return None;
    }

    if let Some(status) = porcelain_status(cwd).await {
        return Some(hex_digest(&status));
    }

    debug!("git status unavailable, fingerprinting HEAD");
    let git_dir = state.git_dir.as_deref()?;
    let head = fs::read(git_dir.join("HEAD")).ok()?;
    let mut material = head.clone();
    if let Some(reference) = std::str::from_utf8(&head)
        .ok()
        .and_then(|h| h.trim().strip_prefix("ref: "))
    {
        if let Ok(target) = fs::read(git_dir.join(reference)) {
            material.extend_from_slice(&target);
        }
    }
    Some(hex_digest(&material))
}

async fn porcelain_status(cwd: &Path) -> Option<Vec<u8>> {
    let mut command = Command::new("git");
    command
        .args(["status", "--porcelain=v2", "--branch"])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(STATUS_TIMEOUT, command.output()).await {
        Ok(Ok(output)) if output.status.success() => Some(output.stdout),
        Ok(Ok(output)) => {
            debug!(status = ?output.status, "git status failed");
            None
        },
        Ok(Err(e)) => {
            debug!(error = %e, "git not runnable");
            None
        },
        Err(_) => {
            debug!("git status timed out");
            None
        },
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
