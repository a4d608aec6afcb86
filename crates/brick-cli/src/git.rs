//! Git-backed version control, driving the `git` executable

use brick_package::{PackageError, Repository, Vcs};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

const REMOTE: &str = "origin";

fn git(dir: Option<&Path>, args: &[&str]) -> std::io::Result<Output> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    debug!("git {}", args.join(" "));
    // never block on credential prompts
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0").output()
}

/// Run git and fail with its stderr on a non-zero exit.
fn run(dir: Option<&Path>, operation: &str, args: &[&str]) -> brick_package::Result<String> {
    let output = git(dir, args).map_err(|e| PackageError::vcs(operation, e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PackageError::vcs(operation, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn succeeds(dir: Option<&Path>, args: &[&str]) -> bool {
    git(dir, args).map(|o| o.status.success()).unwrap_or(false)
}

/// One git working copy.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn run(&self, operation: &str, args: &[&str]) -> brick_package::Result<String> {
        run(Some(&self.path), operation, args)
    }
}

impl Repository for GitRepository {
    fn path(&self) -> &Path {
        &self.path
    }

    fn checkout(&self, reference: &str) -> brick_package::Result<()> {
        self.run("checkout", &["checkout", "-q", reference]).map(drop)
    }

    fn switch_back(&self) -> brick_package::Result<()> {
        self.run("checkout", &["checkout", "-q", "-"]).map(drop)
    }

    fn tag(&self, name: &str) -> brick_package::Result<()> {
        self.run("tag", &["tag", name]).map(drop)
    }

    fn add(&self, paths: &[&str]) -> brick_package::Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run("add", &args).map(drop)
    }

    fn commit(&self, message: &str) -> brick_package::Result<()> {
        self.run("commit", &["commit", "-q", "-m", message]).map(drop)
    }

    fn push(&self) -> brick_package::Result<()> {
        if self.remote_url().is_none() {
            debug!("No remote for {}; skipping push", self.path.display());
            return Ok(());
        }
        self.run("push", &["push", "-q", REMOTE])?;
        self.run("push", &["push", "-q", REMOTE, "--tags"]).map(drop)
    }

    fn remote_url(&self) -> Option<String> {
        self.run("remote", &["remote", "get-url", REMOTE])
            .ok()
            .filter(|url| !url.is_empty())
    }

    fn set_remote_url(&self, url: &str) -> brick_package::Result<()> {
        if self.remote_url().is_some() {
            self.run("remote", &["remote", "set-url", REMOTE, url]).map(drop)
        } else {
            self.run("remote", &["remote", "add", REMOTE, url]).map(drop)
        }
    }

    fn has_write_permission(&self) -> bool {
        if self.remote_url().is_none() {
            return true;
        }
        succeeds(Some(&self.path), &["push", "--dry-run", "-q", REMOTE])
    }

    fn is_latest(&self) -> (bool, bool) {
        if self.remote_url().is_none() {
            return (true, true);
        }
        if !succeeds(Some(&self.path), &["fetch", "-q", REMOTE]) {
            return (false, false);
        }
        match self.run("rev-list", &["rev-list", "--count", "HEAD..@{u}"]) {
            Ok(behind) => (behind == "0", true),
            // no upstream branch to compare against
            Err(_) => (true, true),
        }
    }

    fn list_tags(&self) -> Vec<String> {
        self.run("tag", &["tag", "-l"])
            .map(|out| out.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn branch(&self) -> Option<String> {
        self.run("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"]).ok()
    }
}

/// Opens and clones git repositories.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl Vcs for GitCli {
    fn open(&self, path: &Path) -> Option<Box<dyn Repository>> {
        if path.join(".git").exists() {
            Some(Box::new(GitRepository::new(path)))
        } else {
            None
        }
    }

    fn clone_repository(
        &self,
        source: &str,
        dest: &Path,
    ) -> brick_package::Result<Box<dyn Repository>> {
        let dest_text = dest.to_string_lossy().into_owned();
        run(None, "clone", &["clone", "-q", source, dest_text.as_str()])?;
        Ok(Box::new(GitRepository::new(dest)))
    }

    fn is_valid_remote(&self, url: &str) -> bool {
        succeeds(None, &["ls-remote", "-q", url])
    }

    fn is_blank_remote(&self, url: &str) -> bool {
        match git(None, &["ls-remote", "-q", url]) {
            Ok(output) => output.status.success() && output.stdout.iter().all(u8::is_ascii_whitespace),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_requires_git_dir() {
        let temp = TempDir::new().unwrap();
        assert!(GitCli.open(temp.path()).is_none());

        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let repo = GitCli.open(temp.path()).unwrap();
        assert_eq!(repo.path(), temp.path());
    }
}
