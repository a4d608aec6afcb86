//! Release workflow: version bump, requirement refresh, tag and publish

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::level::{BlockRef, Level};
use crate::metadata::MARKER;
use crate::requirement::Requirement;
use crate::vcs::Repository;
use crate::version::{NextVersion, Version};
use crate::workspace::{VendorIndex, Workspace};
use crate::{PackageError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOptions {
    pub next: NextVersion,
    /// Commit message; defaults to "Releases version vX.Y.Z".
    pub message: Option<String>,
    pub dry_run: bool,
    /// Stage only the marker file (and changelog) instead of everything.
    pub only_meta: bool,
    pub no_install: bool,
    pub skip_changelog: bool,
}

impl ReleaseOptions {
    pub fn new(next: NextVersion) -> Self {
        Self {
            next,
            message: None,
            dry_run: false,
            only_meta: false,
            no_install: false,
            skip_changelog: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangelogStatus {
    Skipped,
    Missing,
    Found(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    NotApplicable,
    Passed,
    Failed,
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PublishStatus::NotApplicable => "N/A",
            PublishStatus::Passed => "PASSED",
            PublishStatus::Failed => "FAILED",
        };
        write!(f, "{}", text)
    }
}

/// Summary of a release, printed after real and dry runs alike.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseReport {
    pub version: Version,
    pub changelog: ChangelogStatus,
    pub requirements: Vec<Requirement>,
    pub branch: String,
    pub message: String,
    pub tag: String,
    pub publish: PublishStatus,
    pub dry_run: bool,
    /// False when a dry run found a problem a real run would reject.
    pub passed: bool,
}

impl fmt::Display for ReleaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- RELEASE REPORT ---")?;
        writeln!(f, "Release point: {}", self.version)?;
        match &self.changelog {
            ChangelogStatus::Skipped => {}
            ChangelogStatus::Missing => writeln!(f, "Identified no CHANGELOG to edit.")?,
            ChangelogStatus::Found(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                writeln!(f, "Identified CHANGELOG {} to edit.", name)?
            }
        }
        writeln!(f, "Block Requirements:")?;
        if self.requirements.is_empty() {
            writeln!(f, "    N/A")?;
        }
        for req in &self.requirements {
            writeln!(f, "    {}", req)?;
        }
        writeln!(f, "Branch: {}", self.branch)?;
        writeln!(f, "Commit message: {}", self.message)?;
        writeln!(f, "Git tag: {}", self.tag)?;
        write!(f, "Publish to vendor: {}", self.publish)?;
        if self.dry_run {
            write!(
                f,
                "\nDry run: {}",
                if self.passed { "PASSED" } else { "FAILED" }
            )?;
        }
        Ok(())
    }
}

impl Workspace {
    /// Cut a new release of a working copy.
    ///
    /// A dry run performs every check and returns the report. Apart from
    /// filling absent metadata keys it writes nothing.
    pub fn release(&mut self, block_ref: &BlockRef, options: &ReleaseOptions) -> Result<ReleaseReport> {
        if block_ref.level != Level::Downloaded {
            return Err(PackageError::NoRepository(self.record(block_ref)?.title()));
        }
        let dry_run = options.dry_run;
        let suffix = self.settings.tag_suffix.clone();

        let vendor_name = self.record(block_ref)?.metadata().vendor().to_string();
        let vendor = if vendor_name.is_empty() {
            None
        } else {
            let found = self.settings.vendor(&vendor_name).cloned();
            if found.is_none() {
                warn!("Vendor {} is not configured; publishing will fail.", vendor_name);
            }
            found
        };

        self.secure(block_ref)?;

        let record = self.record(block_ref)?;
        let title = record.title();
        let repo = record
            .repository()
            .ok_or_else(|| PackageError::NoRepository(title.clone()))?;

        if !repo.has_write_permission() {
            return Err(PackageError::WritePermission(title));
        }
        let vendor_repo = match &vendor {
            Some(v) => {
                let vendor_repo = self
                    .vcs()
                    .open(&v.path)
                    .ok_or_else(|| PackageError::NoRepository(v.name.clone()))?;
                if !vendor_repo.has_write_permission() {
                    return Err(PackageError::WritePermission(v.name.clone()));
                }
                Some(vendor_repo)
            }
            None => None,
        };

        let (up_to_date, reachable) = repo.is_latest();
        if !reachable {
            return Err(PackageError::RemoteUnreachable(title));
        }
        if !up_to_date {
            return Err(PackageError::OutOfSync(title));
        }

        let highest = record.highest_tagged_version(&suffix);
        record.check_integrity(&highest)?;

        let next = match options.next {
            NextVersion::Exact(requested) => {
                // tie goes to the existing release
                if *Version::higher(&requested, &highest) == highest {
                    return Err(PackageError::VersionNotIncreasing { requested, highest });
                }
                requested
            }
            NextVersion::Bump(bump) => highest.bump(bump),
        };
        let branch = repo.branch().unwrap_or_default();
        let changelog_path = record.changelog().map(Path::to_path_buf);
        let has_remote = !record.metadata().remote().is_empty();
        info!("Releasing {} as {}...", title, next);

        let requires = self.update_requires(block_ref, dry_run)?;
        let stable = self.check_stability(&requires);
        if !stable {
            warn!("Block {} has unstable requirements.", title);
            if !dry_run {
                return Err(PackageError::UnstableRequirement(title));
            }
        }

        let changelog = if options.skip_changelog {
            ChangelogStatus::Skipped
        } else {
            match &changelog_path {
                Some(path) => ChangelogStatus::Found(path.clone()),
                None => ChangelogStatus::Missing,
            }
        };
        let changelog_edited = match (&changelog, dry_run) {
            (ChangelogStatus::Found(path), false) => {
                prepend_release(path, &next)?;
                self.prompter().edit_changelog(path)?;
                true
            }
            _ => false,
        };

        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("Releases version {}", next));
        let tag = format!("{}{}", next, suffix);

        let requires = if dry_run {
            requires
        } else {
            let record = self.record_mut(block_ref)?;
            record.set_version(next);
            record.save()?;
            self.registry.rebuild_graph();
            self.update_requires(block_ref, false)?
        };

        if !dry_run {
            let record = self.record_mut(block_ref)?;
            let root = record.path().to_path_buf();
            let repo = record
                .repository()
                .ok_or_else(|| PackageError::NoRepository(title.clone()))?;

            let mut staged: Vec<String> = Vec::new();
            if options.only_meta {
                staged.push(MARKER.to_string());
                if changelog_edited {
                    if let Some(rel) = changelog_path.as_deref().and_then(|p| p.strip_prefix(&root).ok()) {
                        staged.push(rel.to_string_lossy().into_owned());
                    }
                }
            } else {
                staged.push(".".to_string());
            }
            let staged: Vec<&str> = staged.iter().map(String::as_str).collect();
            repo.add(&staged)?;
            repo.commit(&message)?;
            repo.tag(&tag)?;
            repo.push()?;
            record.invalidate_tags();
            info!("Tagged {} as {}.", title, tag);
        }

        if !dry_run && !options.no_install {
            if let Err(e) = self.install(block_ref) {
                warn!("Released {} but could not install it: {}", title, e);
            }
        }

        let publish = match (&vendor, vendor_repo) {
            (Some(index), Some(vendor_repo)) => {
                if !has_remote {
                    warn!("Block {} has no remote; cannot publish to vendor {}.", title, index.name);
                    PublishStatus::Failed
                } else {
                    if !dry_run {
                        self.publish(block_ref, index, vendor_repo.as_ref(), &next)?;
                    }
                    PublishStatus::Passed
                }
            }
            _ if vendor_name.is_empty() => PublishStatus::NotApplicable,
            // named in the metadata but missing from the settings
            _ => PublishStatus::Failed,
        };

        Ok(ReleaseReport {
            version: next,
            changelog,
            requirements: requires,
            branch,
            message,
            tag,
            publish,
            dry_run,
            passed: stable && publish != PublishStatus::Failed,
        })
    }

    /// Write the block's listing into a vendor index and push it.
    fn publish(
        &mut self,
        block_ref: &BlockRef,
        index: &VendorIndex,
        vendor_repo: &dyn Repository,
        version: &Version,
    ) -> Result<()> {
        let suffix = self.settings.tag_suffix.clone();
        let record = self.record(block_ref)?;
        let id = record.id().clone();
        let title = record.title();

        let mut versions: Vec<Version> = record.tagged_versions(&suffix);
        if !versions.contains(version) {
            versions.push(*version);
        }
        versions.sort_by(|a, b| b.cmp(a));

        let mut listing = record.metadata().clone();
        listing.block.versions = Some(versions.iter().map(Version::bare).collect());

        let rel = PathBuf::from(&id.library).join(&id.name);
        let dir = index.path.join(&rel);
        std::fs::create_dir_all(&dir).map_err(|e| PackageError::io(&dir, e))?;
        listing.save(&dir)?;

        let marker = rel.join(MARKER).to_string_lossy().into_owned();
        vendor_repo.add(&[marker.as_str()])?;
        vendor_repo.commit(&format!("Publishes {} version {}", title, version))?;
        vendor_repo.push()?;
        info!("Published {} {} to vendor {}.", title, version, index.name);

        let available = block_ref.at(Level::Available);
        self.registry.remove(&available);
        self.register(&dir, Level::Available)?;
        Ok(())
    }
}

/// Put a heading for `version` at the top of a changelog.
fn prepend_release(path: &Path, version: &Version) -> Result<()> {
    let previous = std::fs::read_to_string(path).map_err(|e| PackageError::io(path, e))?;
    std::fs::write(path, format!("{}\n\n{}", version, previous)).map_err(|e| PackageError::io(path, e))
}
