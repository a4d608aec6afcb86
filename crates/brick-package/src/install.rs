//! Installing blocks into the cache and checking requirement stability

use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::block::BlockRecord;
use crate::cache;
use crate::level::{BlockRef, Level};
use crate::requirement::{Identifier, Requirement, UsageCode};
use crate::unit::Language;
use crate::version::{PartialVersion, Version};
use crate::workspace::Workspace;
use crate::{PackageError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Installed {
        block: BlockRef,
        version: Version,
        size_kb: u64,
    },
    /// The requested version was already in the cache; nothing changed.
    AlreadyInstalled { version: Version },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PinOutcome {
    Created(BlockRef),
    /// An equal or higher version already holds the pin.
    Kept { existing: Version },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UninstallOutcome {
    /// Names of the removed installations (`latest` for the main copy).
    Removed(Vec<String>),
    Cancelled,
}

/// What one install pass has already handled.
///
/// Requirements are tracked by their full text so two pins of the same
/// block are both honoured; blocks are tracked separately so the latest
/// copy is refreshed and walked at most once.
#[derive(Debug, Default)]
struct InstallPass {
    requirements: HashSet<String>,
    blocks: HashSet<Identifier>,
}

impl InstallPass {
    fn is_fresh(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl Workspace {
    fn tag_name(&self, version: &Version) -> String {
        format!("{}{}", version, self.settings.tag_suffix)
    }

    /// Install the "latest" copy of a downloaded or available block.
    pub fn install(&mut self, block_ref: &BlockRef) -> Result<InstallOutcome> {
        self.install_tracked(block_ref, &mut InstallPass::default())
    }

    fn install_tracked(
        &mut self,
        block_ref: &BlockRef,
        pass: &mut InstallPass,
    ) -> Result<InstallOutcome> {
        match block_ref.level {
            Level::Downloaded | Level::Available => {}
            Level::Installed => {
                // an update: reinstall from the most direct source
                let source = self
                    .source_of(&block_ref.key)
                    .ok_or_else(|| PackageError::RepositoryUnavailable(block_ref.key.to_string()))?;
                return self.install_tracked(&source, pass);
            }
            _ => return Err(PackageError::BlockNotFound(block_ref.key.to_string())),
        }

        let record = self.record(block_ref)?;
        let id = record.id().clone();
        let title = record.title();
        info!(
            "Installing latest version v{} for {} to cache...",
            record.version().bare(),
            title
        );

        let remote = record.metadata().remote().to_string();
        let source = if !remote.is_empty() && self.vcs().is_valid_remote(&remote) {
            remote
        } else if block_ref.level == Level::Downloaded {
            record.path().to_string_lossy().into_owned()
        } else {
            return Err(PackageError::RepositoryUnavailable(title));
        };

        let staging = self.cache.staging()?;
        let clone_path = staging.path().join(&id.name);
        self.vcs().clone_repository(&source, &clone_path)?;

        let mut tmp = self.open_transient(&clone_path)?;
        let latest = tmp.highest_tagged_version(&self.settings.tag_suffix);
        if latest == Version::ZERO {
            return Err(PackageError::NoReleases(title));
        }

        let tag = self.tag_name(&latest);
        tmp.repository()
            .ok_or_else(|| PackageError::NoRepository(title.clone()))?
            .checkout(&tag)?;
        tmp.reload()?;
        tmp.check_integrity(&latest)?;
        drop(tmp);

        let installed_ref = BlockRef::new(&id, Level::Installed);
        if self.registry.get(&installed_ref).is_some() {
            debug!("Replacing installed copy of {}", title);
            self.discard_latest(&installed_ref)?;
        }

        let dest = self.cache.latest_path(&id);
        if dest.exists() {
            warn!("Removing stale cache directory {}", dest.display());
            cache::remove_tree(&dest)?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
        }
        self.vcs()
            .clone_repository(&clone_path.to_string_lossy(), &dest)?;
        drop(staging);

        let record = BlockRecord::open(&dest, Level::Installed, self.vcs())?
            .ok_or_else(|| PackageError::MissingMarker { path: dest.clone() })?;
        cache::set_read_only(&dest, true)?;
        let size_kb = record.size_kb();
        info!("Installation size: {} KB.", size_kb);

        let installed_ref = self.registry.insert(record)?;
        pass.blocks.insert(id.key());
        self.install_reqs_tracked(&installed_ref, pass)?;

        Ok(InstallOutcome::Installed {
            block: installed_ref,
            version: latest,
            size_kb,
        })
    }

    /// Remove the installed copy only, keeping pins and parent dirs.
    fn discard_latest(&mut self, installed_ref: &BlockRef) -> Result<()> {
        if let Some(record) = self.registry.remove(installed_ref) {
            cache::remove_tree(record.path())?;
        }
        Ok(())
    }

    /// Downloaded copy if any, else the vendor listing.
    fn source_of(&self, key: &Identifier) -> Option<BlockRef> {
        let slots = self.registry.slots(key)?;
        slots
            .downloaded
            .as_ref()
            .or(slots.available.as_ref())
            .map(|r| r.block_ref())
    }

    /// Pin a specific release of an installed block: the full `vX.Y.Z`
    /// copy plus refreshed `vX` and `vX.Y` pins.
    pub fn install_version(&mut self, key: &Identifier, version: Version) -> Result<InstallOutcome> {
        self.install_version_tracked(key, version, &mut InstallPass::default())
    }

    fn install_version_tracked(
        &mut self,
        key: &Identifier,
        version: Version,
        pass: &mut InstallPass,
    ) -> Result<InstallOutcome> {
        let installed_ref = BlockRef::new(key, Level::Installed);
        let installed = self
            .registry
            .get(&installed_ref)
            .ok_or_else(|| PackageError::NotInstalled(key.to_string()))?;
        let title = installed.title();

        if !installed
            .tagged_versions(&self.settings.tag_suffix)
            .contains(&version)
        {
            return Err(PackageError::UnknownVersion {
                title,
                version: version.to_string(),
            });
        }

        let full_pin = version.to_string();
        if let Some(slots) = self.registry.slots(key) {
            if slots.versioned.contains_key(&full_pin) {
                info!("Version {} is already installed for {}.", version, title);
                return Ok(InstallOutcome::AlreadyInstalled { version });
            }
        }

        info!("Installing {}({})...", title, version);
        let installed_path = installed.path().to_path_buf();
        cache::set_read_only(&installed_path, false)?;

        let result = (|| {
            let full = self.install_partial_version(key, version, 3)?;
            self.install_partial_version(key, version, 1)?;
            self.install_partial_version(key, version, 2)?;
            Ok::<_, PackageError>(full)
        })();
        cache::set_read_only(&installed_path, true)?;

        let pin_ref = match result? {
            PinOutcome::Created(pin_ref) => pin_ref,
            PinOutcome::Kept { .. } => BlockRef::pinned(key, full_pin),
        };
        let size_kb = self.record(&pin_ref)?.size_kb();
        self.install_reqs_tracked(&pin_ref, pass)?;

        Ok(InstallOutcome::Installed {
            block: pin_ref,
            version,
            size_kb,
        })
    }

    /// Create or refresh the pin for `version` truncated to `places`
    /// components. An existing pin is replaced only by a strictly higher
    /// version.
    pub fn install_partial_version(
        &mut self,
        key: &Identifier,
        version: Version,
        places: usize,
    ) -> Result<PinOutcome> {
        let pin = version.truncate(places);
        let pin_name = pin.to_string();
        let pin_ref = BlockRef::pinned(key, pin_name.clone());
        let installed_ref = BlockRef::new(key, Level::Installed);

        // the existing pin must survive a request for an unreleased version
        let installed = self
            .registry
            .get(&installed_ref)
            .ok_or_else(|| PackageError::NotInstalled(key.to_string()))?;
        if !installed
            .tagged_versions(&self.settings.tag_suffix)
            .contains(&version)
        {
            return Err(PackageError::UnknownVersion {
                title: installed.title(),
                version: version.to_string(),
            });
        }

        if let Some(existing) = self.registry.get(&pin_ref) {
            let current = existing.version();
            // tie goes to the existing pin
            if *Version::higher(&version, &current) == current {
                debug!("Keeping pin {} at {} over {}", pin_name, current, version);
                return Ok(PinOutcome::Kept { existing: current });
            }
            info!(
                "Updating partial version {} from {} to {}...",
                pin_name, current, version
            );
            self.discard(&pin_ref)?;
        } else if places < 3 {
            info!("Installing partial version {} as {}...", pin_name, version);
        }

        let installed = self
            .registry
            .get(&installed_ref)
            .ok_or_else(|| PackageError::NotInstalled(key.to_string()))?;
        let id = installed.id().clone();
        let repo = installed
            .repository()
            .ok_or_else(|| PackageError::NoRepository(installed.title()))?;

        let dest = self.cache.pin_path(&id, &pin);
        if dest.exists() {
            warn!("Removing stale cache directory {}", dest.display());
            cache::remove_tree(&dest)?;
        }

        repo.checkout(&self.tag_name(&version))?;
        let exts = self.settings.source_extensions();
        let copied = cache::copy_tree(installed.path(), &dest, false, |rel| {
            places >= 3 || cache::is_source_or_marker(rel, &exts)
        });
        repo.switch_back()?;
        copied?;

        let mut record = BlockRecord::open(&dest, Level::Versioned, self.vcs())?
            .ok_or_else(|| PackageError::MissingMarker { path: dest.clone() })?;
        if let Err(e) = record.check_integrity(&version) {
            cache::remove_tree(&dest)?;
            return Err(e);
        }

        self.suffix_units(&mut record, &pin)?;
        record.metadata_mut().block.size = Some(record.size_kb());
        record.save()?;
        cache::set_read_only(&dest, true)?;
        info!("Installation size: {} KB.", record.size_kb());

        let created = self.registry.insert(record)?;
        Ok(PinOutcome::Created(created))
    }

    /// Rename every unit in a pinned copy to carry the pin suffix and
    /// record the new names in its metadata.
    fn suffix_units(&self, record: &mut BlockRecord, pin: &PartialVersion) -> Result<()> {
        let suffix = pin.unit_suffix();
        let mut files = Vec::new();
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut vhdl_units = Vec::new();
        let mut vlog_units = Vec::new();

        for file in record.sources(&self.settings.source_extensions()) {
            let Some(language) = self.settings.language_of(&file) else {
                continue;
            };
            let units = self.lexer().units(&file, language)?;
            if !units.is_empty() {
                files.push(file);
            }
            for unit in units {
                let renamed = format!("{}{}", unit.name, suffix);
                match language {
                    Language::Vhdl => vhdl_units.push(renamed.clone()),
                    Language::Verilog => vlog_units.push(renamed.clone()),
                }
                pairs.push((unit.name, renamed));
            }
        }

        for file in &files {
            let text = std::fs::read_to_string(file).map_err(|e| PackageError::io(file, e))?;
            let swapped = crate::unit::rename_units(&text, &pairs)?;
            std::fs::write(file, swapped).map_err(|e| PackageError::io(file, e))?;
        }

        let block = &mut record.metadata_mut().block;
        for (old, new) in &pairs {
            if block.toplevel.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(old)) {
                block.toplevel = Some(new.clone());
            }
            if block.bench.as_deref().is_some_and(|b| b.eq_ignore_ascii_case(old)) {
                block.bench = Some(new.clone());
            }
        }
        block.vhdl_units = Some(vhdl_units);
        block.vlog_units = Some(vlog_units);
        Ok(())
    }

    /// Remove installations of a block. With `version`, only pins whose
    /// components start with it; without, every pin and the main copy.
    pub fn uninstall(&mut self, key: &Identifier, version: Option<&str>) -> Result<UninstallOutcome> {
        let installed_ref = BlockRef::new(key, Level::Installed);
        let title = self
            .registry
            .get(&installed_ref)
            .map(|r| r.title())
            .ok_or_else(|| PackageError::NotInstalled(key.to_string()))?;

        let pins: Vec<String> = self
            .registry
            .slots(key)
            .map(|s| s.versioned.keys().cloned().collect())
            .unwrap_or_default();

        let mut selected: Vec<String> = match version {
            Some(text) => {
                let wanted = PartialVersion::parse(text)
                    .ok_or_else(|| PackageError::InvalidVersion(text.to_string()))?;
                let matched: Vec<String> = pins
                    .into_iter()
                    .filter(|p| PartialVersion::parse(p).is_some_and(|pv| pv.starts_with(&wanted)))
                    .collect();
                if matched.is_empty() {
                    return Err(PackageError::VersionNotInstalled {
                        title,
                        version: wanted.to_string(),
                    });
                }
                matched
            }
            None => pins,
        };
        let remove_latest = version.is_none();
        if remove_latest {
            selected.push("latest".to_string());
        }

        let question = format!(
            "From {} would remove:\n\t{}\nProceed to uninstall?",
            title,
            selected.join("\n\t")
        );
        if !self.prompter().confirm(&question) {
            info!("Cancelled.");
            return Ok(UninstallOutcome::Cancelled);
        }

        for pin in selected.iter().filter(|p| *p != "latest") {
            let pin_ref = BlockRef::pinned(key, pin.clone());
            info!("Uninstalled {}({})", title, pin);
            self.discard(&pin_ref)?;
        }
        if remove_latest {
            info!("Uninstalled {}(latest)", title);
            self.discard(&installed_ref)?;
        }
        Ok(UninstallOutcome::Removed(selected))
    }

    /// Make sure every transitive requirement of `block_ref` is present in
    /// the cache in the form it is used.
    pub fn install_reqs(&mut self, block_ref: &BlockRef) -> Result<()> {
        self.install_reqs_tracked(block_ref, &mut InstallPass::default())
    }

    fn install_reqs_tracked(&mut self, block_ref: &BlockRef, pass: &mut InstallPass) -> Result<()> {
        if pass.is_fresh() {
            info!("Collecting requirements...");
        }
        let requirements = self.record(block_ref)?.requirements().to_vec();

        for req in requirements {
            if !pass.requirements.insert(req.to_string().to_lowercase()) {
                continue;
            }
            let key = req.id.key();
            if self.registry.slots(&key).is_none() {
                warn!("Missing block requirement {}.", req);
                continue;
            }

            let installed_ref = BlockRef::new(&key, Level::Installed);
            let first_visit = pass.blocks.insert(key.clone());
            let stale = self
                .registry
                .get(&installed_ref)
                .map(|r| req.uses_latest() && r.version() < req.version);
            if first_visit && stale.unwrap_or(true) {
                let Some(source) = self.source_of(&key) else {
                    warn!("No source available to install {}.", req);
                    continue;
                };
                self.install_tracked(&source, pass)?;
            }

            let Some(installed_version) = self.registry.get(&installed_ref).map(|r| r.version()) else {
                warn!("No installed copy of {} to satisfy {}.", req.id, req);
                continue;
            };
            let mut missing = false;
            for code in &req.codes {
                match code {
                    UsageCode::Latest => {
                        info!(
                            "Found {}(@latest) already satisfied as {}.",
                            req.id, installed_version
                        );
                    }
                    UsageCode::Pinned(pin) => {
                        let present = self
                            .registry
                            .get(&BlockRef::pinned(&key, pin.to_string()))
                            .is_some();
                        if present {
                            info!("Found {}(@{}) already satisfied.", req.id, pin);
                        } else {
                            info!("Missing {}(@{}). Using {} to satisfy constraint.", req.id, pin, req.version);
                            missing = true;
                        }
                    }
                    UsageCode::Unstable => {
                        warn!("Requirement {} uses an unstable working copy.", req);
                    }
                }
            }
            if missing {
                self.install_version_tracked(&key, req.version, pass)?;
            }
            if first_visit {
                self.install_reqs_tracked(&installed_ref, pass)?;
            }
        }
        Ok(())
    }

    /// Recompute the direct requirements of a block from its units.
    ///
    /// The marker file is rewritten only when the set changed and
    /// `dry_run` is false.
    pub fn update_requires(&mut self, block_ref: &BlockRef, dry_run: bool) -> Result<Vec<Requirement>> {
        let catalog = self.catalog()?;
        let multi_develop = self.settings.multi_develop;

        // (key, version) -> (display id, codes)
        let mut found: BTreeMap<(Identifier, Version), (Identifier, Vec<UsageCode>)> = BTreeMap::new();
        for idx in catalog.owned_by(block_ref) {
            for dep in &catalog.entry(idx).unit.dependencies {
                let Some(target) = catalog.resolve(idx, dep, multi_develop) else {
                    continue;
                };
                let owner = &catalog.entry(target).owner;
                if owner.key == block_ref.key {
                    continue;
                }
                let record = self.record(owner)?;
                found
                    .entry((record.key(), record.version()))
                    .or_insert_with(|| (record.id().clone(), Vec::new()))
                    .1
                    .push(record.usage_code());
            }
        }

        let requires: Vec<Requirement> = found
            .into_iter()
            .map(|((_, version), (id, codes))| Requirement::new(id, version, codes))
            .collect();

        let record = self.record(block_ref)?;
        let normalize = |reqs: &[Requirement]| -> Vec<String> {
            let mut texts: Vec<String> = reqs.iter().map(|r| r.to_string().to_lowercase()).collect();
            texts.sort();
            texts
        };
        let changed = normalize(record.requirements()) != normalize(&requires);

        if changed && !dry_run {
            info!("Saving new requirements to metadata...");
            let record = self.record_mut(block_ref)?;
            record.set_requirements(requires.clone());
            record.save()?;
            self.registry.rebuild_graph();
        } else if changed {
            info!("Detected changes in block requirements.");
        } else {
            debug!("No change in block requirements found.");
        }
        Ok(requires)
    }

    /// True when no direct or transitive requirement is consumed through
    /// an unstable working copy. Any lookup failure counts as unstable.
    pub fn check_stability(&self, requirements: &[Requirement]) -> bool {
        let mut pending: VecDeque<Requirement> = requirements.iter().cloned().collect();
        let mut seen: HashSet<Requirement> = HashSet::new();

        while let Some(req) = pending.pop_front() {
            if req.is_unstable() {
                debug!("Requirement {} is unstable", req);
                return false;
            }
            if !seen.insert(req.clone()) {
                continue;
            }

            let key = req.id.key();
            let Some(slots) = self.registry.slots(&key) else {
                warn!("Unknown block requirement: {}", req);
                return false;
            };
            let Some(installed) = slots.installed.as_ref() else {
                warn!("Block requirement {} not found in the cache.", req);
                return false;
            };
            let target = if req.uses_latest() {
                installed
            } else {
                match slots.versioned.get(&req.version.to_string()) {
                    Some(pinned) => pinned,
                    None => {
                        warn!("Unidentified version '{}' from block requirement {}", req.version, req);
                        return false;
                    }
                }
            };

            let node = crate::requirement::BlockNode::new(target.id(), target.version());
            let neighbors = self.registry.graph().neighbors(&node, false);
            for next in target.requirements() {
                if neighbors.contains(&next.node()) {
                    pending.push_back(next.clone());
                }
            }
        }
        true
    }
}
