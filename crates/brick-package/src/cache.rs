//! Installation cache layout and filesystem helpers
//!
//! ```text
//! <root>/<vendor or _>/<library>/<name>/<name>/   "latest" installed copy
//! <root>/<vendor or _>/<library>/<name>/v1/       partial pin
//! <root>/<vendor or _>/<library>/<name>/v1.2.3/   full pin
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

use crate::level::Level;
use crate::metadata::{BlockMetadata, MARKER};
use crate::requirement::Identifier;
use crate::version::{self, PartialVersion};
use crate::{PackageError, Result};

/// A cache directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCopy {
    pub path: PathBuf,
    pub level: Level,
    /// Pin directory name for versioned copies.
    pub pin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every copy of one block.
    pub fn block_dir(&self, id: &Identifier) -> PathBuf {
        let rail = if id.vendor.is_empty() { "_" } else { id.vendor.as_str() };
        self.root.join(rail).join(&id.library).join(&id.name)
    }

    pub fn latest_path(&self, id: &Identifier) -> PathBuf {
        self.block_dir(id).join(&id.name)
    }

    pub fn pin_path(&self, id: &Identifier, pin: &PartialVersion) -> PathBuf {
        self.block_dir(id).join(pin.to_string())
    }

    /// Fresh staging directory inside the cache root.
    pub fn staging(&self) -> Result<TempDir> {
        fs::create_dir_all(&self.root).map_err(|e| PackageError::io(&self.root, e))?;
        tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| PackageError::io(&self.root, e))
    }

    /// Every installed and pinned copy under the root.
    pub fn discover(&self) -> Vec<CachedCopy> {
        let mut found = Vec::new();
        if !self.root.is_dir() {
            return found;
        }

        let block_dirs = WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir());

        for block_dir in block_dirs {
            let Ok(children) = fs::read_dir(block_dir.path()) else {
                continue;
            };
            let mut children: Vec<PathBuf> = children
                .filter_map(|c| c.ok())
                .map(|c| c.path())
                .filter(|p| p.is_dir() && BlockMetadata::is_block_dir(p))
                .collect();
            children.sort();

            for child in children {
                let Some(dir_name) = child.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if dir_name.eq_ignore_ascii_case(&block_dir.file_name().to_string_lossy()) {
                    found.push(CachedCopy {
                        path: child.clone(),
                        level: Level::Installed,
                        pin: None,
                    });
                } else if version::is_valid(dir_name, &[1, 2, 3]) {
                    found.push(CachedCopy {
                        path: child.clone(),
                        level: Level::Versioned,
                        pin: Some(dir_name.to_string()),
                    });
                } else {
                    debug!("Ignoring unrecognized cache directory {}", child.display());
                }
            }
        }
        found
    }
}

/// Copy `src` into a new directory `dst`.
///
/// `.git` directories are skipped unless `with_git`; files for which
/// `keep` returns false (given the path relative to `src`) are skipped.
pub fn copy_tree<F>(src: &Path, dst: &Path, with_git: bool, keep: F) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    if dst.exists() {
        return Err(PackageError::PathExists(dst.to_path_buf()));
    }
    fs::create_dir_all(dst).map_err(|e| PackageError::io(dst, e))?;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| with_git || e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PackageError::io(path, e.into())
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PackageError::io(&target, e))?;
        } else if keep(rel) {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| PackageError::io(entry.path(), e))?;
            // copies of read-only files stay writable until locked explicitly
            set_writable(&target, true)?;
        }
    }
    Ok(())
}

/// True if `rel` has one of `extensions` (case-insensitive) or is the
/// marker file.
pub fn is_source_or_marker(rel: &Path, extensions: &[String]) -> bool {
    if rel.file_name().and_then(|n| n.to_str()) == Some(MARKER) {
        return true;
    }
    rel.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

#[allow(clippy::permissions_set_readonly_false)]
fn set_writable(path: &Path, writable: bool) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| PackageError::io(path, e))?;
    let mut perms = meta.permissions();
    if perms.readonly() == !writable {
        return Ok(());
    }
    perms.set_readonly(!writable);
    fs::set_permissions(path, perms).map_err(|e| PackageError::io(path, e))
}

/// Toggle write permission on every file under `path`, `.git` excluded.
pub fn set_read_only(path: &Path, read_only: bool) -> Result<()> {
    let files = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());
    for file in files {
        set_writable(file.path(), !read_only)?;
    }
    Ok(())
}

/// Remove a directory tree, read-only files included. Missing is fine.
pub fn remove_tree(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    set_read_only(path, false)?;
    fs::remove_dir_all(path).map_err(|e| PackageError::io(path, e))
}

/// Total size of the files under `path` in kilobytes, rounded up.
pub fn dir_size_kb(path: &Path) -> u64 {
    let bytes: u64 = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();
    (bytes + 1023) / 1024
}

/// Remove up to `levels` empty ancestors of `path`, never touching `stop`.
pub fn prune_empty(path: &Path, levels: usize, stop: &Path) {
    let mut current = path.parent();
    for _ in 0..levels {
        let Some(dir) = current else {
            break;
        };
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        let empty = fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false);
        if !empty || fs::remove_dir(dir).is_err() {
            break;
        }
        debug!("Pruned empty directory {}", dir.display());
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_paths() {
        let cache = CacheLayout::new("/cache");
        let plain = Identifier::new("", "arith", "adder");
        let vended = Identifier::new("acme", "arith", "adder");
        assert_eq!(cache.latest_path(&plain), PathBuf::from("/cache/_/arith/adder/adder"));
        assert_eq!(
            cache.pin_path(&vended, &PartialVersion::parse("v1.2").unwrap()),
            PathBuf::from("/cache/acme/arith/adder/v1.2")
        );
    }

    #[test]
    fn test_discover_levels() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheLayout::new(tmp.path());
        let base = tmp.path().join("_/arith/adder");
        touch(&base.join("adder").join(MARKER), "");
        touch(&base.join("v1").join(MARKER), "");
        touch(&base.join("v1.0.2").join(MARKER), "");
        touch(&base.join("notes/readme.txt"), "");

        let found = cache.discover();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].level, Level::Installed);
        assert_eq!(found[1].pin.as_deref(), Some("v1"));
        assert_eq!(found[2].pin.as_deref(), Some("v1.0.2"));
    }

    #[test]
    fn test_copy_tree_filters() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        touch(&src.join("rtl/adder.vhd"), "entity adder");
        touch(&src.join("docs/notes.txt"), "notes");
        touch(&src.join(".git/HEAD"), "ref");
        touch(&src.join(MARKER), "[block]");

        let exts = vec!["vhd".to_string()];
        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst, false, |rel| is_source_or_marker(rel, &exts)).unwrap();

        assert!(dst.join("rtl/adder.vhd").is_file());
        assert!(dst.join(MARKER).is_file());
        assert!(!dst.join("docs/notes.txt").exists());
        assert!(!dst.join(".git").exists());

        assert!(matches!(
            copy_tree(&src, &dst, false, |_| true),
            Err(PackageError::PathExists(_))
        ));
    }

    #[test]
    fn test_read_only_and_remove() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("block");
        touch(&dir.join("a.vhd"), "x");
        set_read_only(&dir, true).unwrap();
        assert!(fs::metadata(dir.join("a.vhd")).unwrap().permissions().readonly());
        remove_tree(&dir).unwrap();
        assert!(!dir.exists());
        remove_tree(&dir).unwrap();
    }

    #[test]
    fn test_size_rounds_up() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a"), &"x".repeat(1500));
        assert_eq!(dir_size_kb(tmp.path()), 2);
    }

    #[test]
    fn test_prune_stops_at_root() {
        let tmp = TempDir::new().unwrap();
        let leaf = tmp.path().join("_/arith/adder/adder");
        fs::create_dir_all(&leaf).unwrap();
        fs::remove_dir(&leaf).unwrap();
        prune_empty(&leaf, 3, tmp.path());
        assert!(!tmp.path().join("_").exists());
        assert!(tmp.path().exists());
    }
}
