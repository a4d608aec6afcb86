//! Version-control collaborator interfaces
//!
//! The engine never shells out itself; the CLI supplies a git-backed
//! implementation and tests supply an in-memory one.

use std::path::Path;

use crate::Result;

/// Handle on one working copy.
pub trait Repository {
    fn path(&self) -> &Path;

    /// Check out a tag or other reference.
    fn checkout(&self, reference: &str) -> Result<()>;

    /// Return to the reference checked out before the last `checkout`.
    fn switch_back(&self) -> Result<()>;

    fn tag(&self, name: &str) -> Result<()>;

    /// Stage paths relative to the repository root (`.` for everything).
    fn add(&self, paths: &[&str]) -> Result<()>;

    fn commit(&self, message: &str) -> Result<()>;

    fn push(&self) -> Result<()>;

    /// Configured remote, if any.
    fn remote_url(&self) -> Option<String>;

    fn set_remote_url(&self, url: &str) -> Result<()>;

    fn has_write_permission(&self) -> bool;

    /// `(up_to_date, reachable)` relative to the remote. A repository
    /// without a remote is up to date and reachable.
    fn is_latest(&self) -> (bool, bool);

    fn list_tags(&self) -> Vec<String>;

    /// Current branch name.
    fn branch(&self) -> Option<String>;
}

/// Factory for repositories.
pub trait Vcs {
    /// Open an existing working copy; `None` if `path` is not one.
    fn open(&self, path: &Path) -> Option<Box<dyn Repository>>;

    /// Clone `source` (remote URL or local path) into `dest`.
    fn clone_repository(&self, source: &str, dest: &Path) -> Result<Box<dyn Repository>>;

    /// True if `url` names a reachable remote repository.
    fn is_valid_remote(&self, url: &str) -> bool;

    /// True if `url` is reachable but has no commits.
    fn is_blank_remote(&self, url: &str) -> bool;
}
