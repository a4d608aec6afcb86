//! One block at one installation level

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::cache;
use crate::level::{BlockRef, Level};
use crate::metadata::BlockMetadata;
use crate::requirement::{Identifier, Requirement, UsageCode};
use crate::vcs::{Repository, Vcs};
use crate::version::{self, PartialVersion, Version};
use crate::{PackageError, Result};

/// File names recognized as a changelog, compared case-insensitively.
pub const CHANGELOG_NAMES: [&str; 3] = ["changelog.md", "change.log", "changelog.txt"];

/// A block copy on disk together with its metadata and, for working
/// copies, its repository handle.
pub struct BlockRecord {
    id: Identifier,
    level: Level,
    path: PathBuf,
    pin: Option<String>,
    metadata: BlockMetadata,
    repo: Option<Box<dyn Repository>>,
    tags: OnceCell<Vec<String>>,
    changelog: OnceCell<Option<PathBuf>>,
}

impl std::fmt::Debug for BlockRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRecord")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("path", &self.path)
            .field("pin", &self.pin)
            .field("version", &self.version())
            .field("repo", &self.repo.is_some())
            .finish()
    }
}

impl BlockRecord {
    /// Open the block at `path`. Returns `Ok(None)` when the directory
    /// holds no marker file.
    pub fn open(path: &Path, level: Level, vcs: &dyn Vcs) -> Result<Option<Self>> {
        if !BlockMetadata::is_block_dir(path) {
            return Ok(None);
        }
        let metadata = BlockMetadata::load(path)?;
        let repo = if level.has_repository() {
            vcs.open(path)
        } else {
            None
        };
        let pin = match level {
            Level::Versioned => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
            _ => None,
        };
        Ok(Some(Self::from_parts(path, level, metadata, repo, pin)))
    }

    pub fn from_parts(
        path: &Path,
        level: Level,
        metadata: BlockMetadata,
        repo: Option<Box<dyn Repository>>,
        pin: Option<String>,
    ) -> Self {
        let id = Identifier::new(metadata.vendor(), metadata.library(), metadata.name());
        Self {
            id,
            level,
            path: path.to_path_buf(),
            pin,
            metadata,
            repo,
            tags: OnceCell::new(),
            changelog: OnceCell::new(),
        }
    }

    /// Re-read the marker file, e.g. after a checkout changed it.
    pub fn reload(&mut self) -> Result<()> {
        self.metadata = BlockMetadata::load(&self.path)?;
        self.id = Identifier::new(
            self.metadata.vendor(),
            self.metadata.library(),
            self.metadata.name(),
        );
        self.changelog = OnceCell::new();
        Ok(())
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn key(&self) -> Identifier {
        self.id.key()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pin(&self) -> Option<&str> {
        self.pin.as_deref()
    }

    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            key: self.key(),
            level: self.level,
            pin: self.pin.clone(),
        }
    }

    pub fn metadata(&self) -> &BlockMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BlockMetadata {
        &mut self.metadata
    }

    pub fn version(&self) -> Version {
        self.metadata.version()
    }

    pub fn set_version(&mut self, version: Version) {
        self.metadata.set_version(version);
    }

    pub fn requirements(&self) -> &[Requirement] {
        self.metadata.requires()
    }

    pub fn set_requirements(&mut self, requires: Vec<Requirement>) {
        self.metadata.block.requires = Some(requires);
    }

    pub fn repository(&self) -> Option<&dyn Repository> {
        self.repo.as_deref()
    }

    pub fn save(&self) -> Result<()> {
        self.metadata.save(&self.path)
    }

    /// `vendor.library.name` without a version.
    pub fn title(&self) -> String {
        self.id.to_string()
    }

    /// Title with the version chain, e.g. `arith.adder(latest-@v1.2.0)`.
    pub fn full_title(&self, codes: &[UsageCode]) -> String {
        self.id.full_title(&self.version(), codes)
    }

    /// How a dependent consumes this copy.
    pub fn usage_code(&self) -> UsageCode {
        match self.level {
            Level::Downloaded | Level::Transient => UsageCode::Unstable,
            Level::Installed => UsageCode::Latest,
            Level::Versioned => self
                .pin
                .as_deref()
                .and_then(PartialVersion::parse)
                .map(UsageCode::Pinned)
                .unwrap_or_else(|| UsageCode::Pinned(self.version().into())),
            Level::Available => UsageCode::Pinned(self.version().into()),
        }
    }

    fn raw_tags(&self) -> &[String] {
        self.tags.get_or_init(|| {
            self.repo
                .as_ref()
                .map(|r| r.list_tags())
                .unwrap_or_default()
        })
    }

    /// Forget memoized tags after tagging.
    pub fn invalidate_tags(&mut self) {
        self.tags = OnceCell::new();
    }

    /// Release versions tagged with `suffix`, ascending.
    pub fn tagged_versions(&self, suffix: &str) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .raw_tags()
            .iter()
            .filter_map(|t| t.strip_suffix(suffix))
            .filter(|t| version::is_valid(t, &[3]))
            .map(Version::parse)
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    /// Highest release tag, `v0.0.0` if there is none.
    pub fn highest_tagged_version(&self, suffix: &str) -> Version {
        self.tagged_versions(suffix)
            .iter()
            .fold(Version::ZERO, |highest, v| *Version::higher(&highest, v))
    }

    /// Fail if the metadata cannot represent release `version`.
    pub fn check_integrity(&self, version: &Version) -> Result<()> {
        let corrupt = |reason: String| PackageError::Corrupt {
            title: self.title(),
            version: version.to_string(),
            reason,
        };
        if let Some(defect) = self.metadata.defect() {
            return Err(corrupt(defect));
        }
        let recorded = self.metadata.block.version.as_deref().unwrap_or("");
        if version::normalize(recorded) != version.bare() {
            return Err(corrupt(format!(
                "metadata records version '{}'",
                recorded
            )));
        }
        Ok(())
    }

    pub fn is_corrupt(&self, version: &Version) -> bool {
        self.check_integrity(version).is_err()
    }

    /// Fill missing metadata keys and, for working copies, align the
    /// recorded version and remote with the repository.
    pub fn secure(&mut self, tag_suffix: &str, vcs: &dyn Vcs) -> Result<()> {
        let mut changed = self.metadata.secure();

        if let Some(repo) = self.repo.as_deref() {
            let highest = self.highest_tagged_version(tag_suffix);
            if self.metadata.block.version.as_deref() != Some(highest.bare().as_str()) {
                self.metadata.set_version(highest);
                changed = true;
            }

            let recorded = self.metadata.remote().to_string();
            let actual = repo.remote_url().unwrap_or_default();
            if recorded != actual && !recorded.is_empty() && vcs.is_valid_remote(&recorded) {
                repo.set_remote_url(&recorded)?;
            }
            let remote = repo.remote_url().unwrap_or_default();
            if self.metadata.remote() != remote {
                self.metadata.block.remote = Some(remote);
                changed = true;
            }
        }

        if changed {
            debug!("Secured metadata for {}", self.title());
            self.save()?;
        }
        Ok(())
    }

    /// First recognized changelog anywhere under the block path.
    pub fn changelog(&self) -> Option<&Path> {
        self.changelog
            .get_or_init(|| {
                WalkDir::new(&self.path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| e.file_name() != ".git")
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .find(|e| {
                        let name = e.file_name().to_string_lossy().to_lowercase();
                        CHANGELOG_NAMES.contains(&name.as_str())
                    })
                    .map(|e| e.into_path())
            })
            .as_deref()
    }

    /// Source files with one of `extensions`, skipping `.git` and the
    /// top-level `build` directory.
    pub fn sources(&self, extensions: &[String]) -> Vec<PathBuf> {
        let build = self.path.join("build");
        WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git" && e.path() != build)
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| extensions.iter().any(|ext| ext.eq_ignore_ascii_case(x)))
            })
            .map(|e| e.into_path())
            .collect()
    }

    pub fn size_kb(&self) -> u64 {
        cache::dir_size_kb(&self.path)
    }
}
