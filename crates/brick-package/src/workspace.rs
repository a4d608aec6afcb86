//! Per-invocation engine context
//!
//! A `Workspace` owns the registry, cache layout, settings snapshot and
//! the injected collaborators. It is built once per command and passed
//! to every operation.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::block::BlockRecord;
use crate::cache::CacheLayout;
use crate::level::{BlockRef, Level};
use crate::metadata::BlockMetadata;
use crate::prompt::Prompter;
use crate::registry::BlockRegistry;
use crate::requirement::Identifier;
use crate::unit::{Language, UnitCatalog, UnitLexer};
use crate::vcs::Vcs;
use crate::{PackageError, Result};

/// A vendor index repository listing publishable blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorIndex {
    pub name: String,
    pub path: PathBuf,
}

/// Settings the engine needs, already resolved by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Appended to `vX.Y.Z` when tagging a release.
    pub tag_suffix: String,
    pub vhdl_extensions: Vec<String>,
    pub verilog_extensions: Vec<String>,
    /// Resolve units against working copies before installed copies.
    pub multi_develop: bool,
    /// Root scanned for working copies.
    pub workspace_path: Option<PathBuf>,
    pub cache_path: PathBuf,
    pub vendors: Vec<VendorIndex>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tag_suffix: "-brick".to_string(),
            vhdl_extensions: vec!["vhd".to_string(), "vhdl".to_string()],
            verilog_extensions: vec!["v".to_string(), "sv".to_string()],
            multi_develop: false,
            workspace_path: None,
            cache_path: PathBuf::from("cache"),
            vendors: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn source_extensions(&self) -> Vec<String> {
        self.vhdl_extensions
            .iter()
            .chain(self.verilog_extensions.iter())
            .cloned()
            .collect()
    }

    pub fn language_of(&self, file: &Path) -> Option<Language> {
        let ext = file.extension()?.to_str()?;
        if self.vhdl_extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)) {
            Some(Language::Vhdl)
        } else if self.verilog_extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)) {
            Some(Language::Verilog)
        } else {
            None
        }
    }

    pub fn vendor(&self, name: &str) -> Option<&VendorIndex> {
        self.vendors.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }
}

pub struct Workspace {
    pub settings: EngineSettings,
    pub registry: BlockRegistry,
    pub cache: CacheLayout,
    vcs: Box<dyn Vcs>,
    prompter: Box<dyn Prompter>,
    lexer: Box<dyn UnitLexer>,
}

impl Workspace {
    /// Context with an empty registry.
    pub fn new(
        settings: EngineSettings,
        vcs: Box<dyn Vcs>,
        prompter: Box<dyn Prompter>,
        lexer: Box<dyn UnitLexer>,
    ) -> Self {
        let cache = CacheLayout::new(settings.cache_path.clone());
        Self {
            settings,
            registry: BlockRegistry::new(),
            cache,
            vcs,
            prompter,
            lexer,
        }
    }

    /// Context with every working copy, cache copy and vendor listing
    /// registered.
    pub fn load(
        settings: EngineSettings,
        vcs: Box<dyn Vcs>,
        prompter: Box<dyn Prompter>,
        lexer: Box<dyn UnitLexer>,
    ) -> Result<Self> {
        let mut ws = Self::new(settings, vcs, prompter, lexer);
        ws.scan()?;
        Ok(ws)
    }

    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    pub fn lexer(&self) -> &dyn UnitLexer {
        self.lexer.as_ref()
    }

    /// Rebuild the registry from disk.
    pub fn scan(&mut self) -> Result<()> {
        self.registry = BlockRegistry::new();

        if let Some(root) = self.settings.workspace_path.clone() {
            for dir in find_block_dirs(&root, usize::MAX) {
                self.register(&dir, Level::Downloaded)?;
            }
        }

        for copy in self.cache.discover() {
            self.register(&copy.path, copy.level)?;
        }

        for vendor in self.settings.vendors.clone() {
            // <vendor>/<library>/<name>/Block.toml
            for dir in find_block_dirs(&vendor.path, 2) {
                self.register(&dir, Level::Available)?;
            }
        }

        debug!("Registered {} blocks", self.registry.keys().len());
        Ok(())
    }

    pub(crate) fn register(&mut self, path: &Path, level: Level) -> Result<()> {
        let record = match BlockRecord::open(path, level, self.vcs.as_ref()) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            // one broken marker must not hide every other block
            Err(e @ (PackageError::ParseError { .. } | PackageError::Io { .. })) => {
                warn!("Skipping unreadable block at {}: {}", path.display(), e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if record.metadata().library().is_empty() || record.metadata().name().is_empty() {
            warn!("Skipping block with incomplete identity at {}", path.display());
            return Ok(());
        }
        self.registry.insert(record)?;
        Ok(())
    }

    /// Run [`BlockRecord::secure`] on a registered record.
    pub(crate) fn secure(&mut self, block_ref: &BlockRef) -> Result<()> {
        let record = self
            .registry
            .get_mut(block_ref)
            .ok_or_else(|| PackageError::BlockNotFound(describe(block_ref)))?;
        record.secure(&self.settings.tag_suffix, self.vcs.as_ref())?;
        self.registry.rebuild_graph();
        Ok(())
    }

    /// Open a copy that is never registered, e.g. a staging clone.
    pub fn open_transient(&self, path: &Path) -> Result<BlockRecord> {
        BlockRecord::open(path, Level::Transient, self.vcs.as_ref())?.ok_or_else(|| {
            PackageError::MissingMarker {
                path: path.to_path_buf(),
            }
        })
    }

    /// Working copy enclosing `cwd`, innermost first.
    pub fn current_block(&self, cwd: &Path) -> Option<BlockRef> {
        self.registry
            .records()
            .filter(|r| r.level() == Level::Downloaded && cwd.starts_with(r.path()))
            .max_by_key(|r| r.path().components().count())
            .map(|r| r.block_ref())
    }

    /// Resolve a `[vendor.]library.name` title to a registered key.
    pub fn find(&self, title: &str) -> Result<Identifier> {
        self.registry.find(title)
    }

    pub fn record(&self, block_ref: &BlockRef) -> Result<&BlockRecord> {
        self.registry
            .get(block_ref)
            .ok_or_else(|| PackageError::BlockNotFound(describe(block_ref)))
    }

    pub fn record_mut(&mut self, block_ref: &BlockRef) -> Result<&mut BlockRecord> {
        self.registry
            .get_mut(block_ref)
            .ok_or_else(|| PackageError::BlockNotFound(describe(block_ref)))
    }

    /// Every unit of every working, installed and pinned copy.
    pub fn catalog(&self) -> Result<UnitCatalog> {
        let exts = self.settings.source_extensions();
        let mut catalog = UnitCatalog::new();
        for record in self.registry.records() {
            if record.level() == Level::Available {
                continue;
            }
            let mut units = Vec::new();
            for file in record.sources(&exts) {
                let Some(language) = self.settings.language_of(&file) else {
                    continue;
                };
                units.extend(self.lexer.units(&file, language)?);
            }
            catalog.add(&record.block_ref(), record.metadata().library(), units);
        }
        Ok(catalog)
    }

    /// Remove a record and its directory without asking.
    pub(crate) fn discard(&mut self, block_ref: &BlockRef) -> Result<()> {
        let Some(record) = self.registry.remove(block_ref) else {
            return Ok(());
        };
        crate::cache::remove_tree(record.path())?;
        if record.path().starts_with(self.cache.root()) {
            crate::cache::prune_empty(record.path(), 3, self.cache.root());
        }
        Ok(())
    }

    /// Delete a block copy from disk.
    ///
    /// When the copy exists at no other level the prompter must confirm.
    /// Returns false if cancelled.
    pub fn delete(&mut self, block_ref: &BlockRef) -> Result<bool> {
        let title = self.record(block_ref)?.title();
        if !self.registry.exists_elsewhere(block_ref) {
            let question = format!(
                "Block {} does not exist anywhere else; deleting it may make it unrecoverable. Delete anyway?",
                title
            );
            if !self.prompter.confirm(&question) {
                info!("Cancelled.");
                return Ok(false);
            }
        }
        self.discard(block_ref)?;
        if block_ref.level == Level::Downloaded {
            info!("Deleted block {} from downloads.", title);
        } else {
            info!("Deleted {} copy of {}.", block_ref.level, title);
        }
        Ok(true)
    }
}

fn describe(block_ref: &BlockRef) -> String {
    match &block_ref.pin {
        Some(pin) => format!("{}({})", block_ref.key, pin),
        None => format!("{} ({})", block_ref.key, block_ref.level),
    }
}

/// Directories under `root` holding a marker file, not descending into
/// blocks, `.git` or hidden directories. `max_depth` bounds the search.
fn find_block_dirs(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if !root.is_dir() {
        return found;
    }
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            walker.skip_current_dir();
            continue;
        }
        if BlockMetadata::is_block_dir(entry.path()) {
            found.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MARKER;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_marker(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join(MARKER),
            format!(
                "[block]\nname = \"{}\"\nlibrary = \"arith\"\nversion = \"1.0.0\"\n\
                 remote = \"\"\nvendor = \"\"\nrequires = []\n",
                name
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_find_block_dirs_stops_at_blocks() {
        let tmp = TempDir::new().unwrap();
        write_marker(&tmp.path().join("adder"), "adder");
        write_marker(&tmp.path().join("adder/nested"), "nested");
        write_marker(&tmp.path().join("group/mux"), "mux");
        write_marker(&tmp.path().join(".hidden/ghost"), "ghost");

        let found = find_block_dirs(tmp.path(), usize::MAX);
        assert_eq!(
            found,
            vec![tmp.path().join("adder"), tmp.path().join("group/mux")]
        );
    }

    #[test]
    fn test_language_detection() {
        let settings = EngineSettings::default();
        assert_eq!(settings.language_of(Path::new("a.VHD")), Some(Language::Vhdl));
        assert_eq!(settings.language_of(Path::new("a.sv")), Some(Language::Verilog));
        assert_eq!(settings.language_of(Path::new("a.txt")), None);
        assert_eq!(settings.source_extensions().len(), 4);
    }

    #[test]
    fn test_vendor_lookup_ignores_case() {
        let settings = EngineSettings {
            vendors: vec![VendorIndex {
                name: "Acme".into(),
                path: PathBuf::from("/v"),
            }],
            ..EngineSettings::default()
        };
        assert!(settings.vendor("acme").is_some());
        assert!(settings.vendor("zeta").is_none());
    }
}
