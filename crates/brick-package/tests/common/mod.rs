//! In-memory version control and sandbox helpers shared by the engine
//! integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use brick_package::vcs::{Repository, Vcs};
use brick_package::workspace::VendorIndex;
use brick_package::*;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Relative path -> file content.
type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

pub struct World {
    /// Every initialized repository and its tags.
    pub tags: HashMap<PathBuf, BTreeMap<String, Snapshot>>,
    /// Working tree saved by the last checkout, restored by switch_back.
    head: HashMap<PathBuf, Snapshot>,
    /// Reachable remote URLs and the repository behind them.
    pub remotes: HashMap<String, PathBuf>,
    pub remote_of: HashMap<PathBuf, String>,
    pub writable: bool,
    pub up_to_date: bool,
    pub reachable: bool,
    /// "<operation> <repo dir name> <detail>"
    pub log: Vec<String>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            tags: HashMap::new(),
            head: HashMap::new(),
            remotes: HashMap::new(),
            remote_of: HashMap::new(),
            writable: true,
            up_to_date: true,
            reachable: true,
            log: Vec::new(),
        }
    }
}

fn snapshot(root: &Path) -> Snapshot {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn restore(root: &Path, snap: &Snapshot) {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    for file in files {
        fs::remove_file(file).unwrap();
    }
    for (rel, content) in snap {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

pub struct FakeRepo {
    path: PathBuf,
    world: Rc<RefCell<World>>,
}

impl Repository for FakeRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn checkout(&self, reference: &str) -> brick_package::Result<()> {
        let mut world = self.world.borrow_mut();
        let snap = world
            .tags
            .get(&self.path)
            .and_then(|t| t.get(reference))
            .cloned()
            .ok_or_else(|| PackageError::vcs("checkout", format!("no tag {}", reference)))?;
        world.head.insert(self.path.clone(), snapshot(&self.path));
        restore(&self.path, &snap);
        Ok(())
    }

    fn switch_back(&self) -> brick_package::Result<()> {
        if let Some(snap) = self.world.borrow_mut().head.remove(&self.path) {
            restore(&self.path, &snap);
        }
        Ok(())
    }

    fn tag(&self, name: &str) -> brick_package::Result<()> {
        let snap = snapshot(&self.path);
        let mut world = self.world.borrow_mut();
        world
            .tags
            .entry(self.path.clone())
            .or_default()
            .insert(name.to_string(), snap);
        world.log.push(format!("tag {} {}", dir_name(&self.path), name));
        Ok(())
    }

    fn add(&self, paths: &[&str]) -> brick_package::Result<()> {
        self.world
            .borrow_mut()
            .log
            .push(format!("add {} {}", dir_name(&self.path), paths.join(" ")));
        Ok(())
    }

    fn commit(&self, message: &str) -> brick_package::Result<()> {
        self.world
            .borrow_mut()
            .log
            .push(format!("commit {} {}", dir_name(&self.path), message));
        Ok(())
    }

    fn push(&self) -> brick_package::Result<()> {
        self.world
            .borrow_mut()
            .log
            .push(format!("push {}", dir_name(&self.path)));
        Ok(())
    }

    fn remote_url(&self) -> Option<String> {
        self.world.borrow().remote_of.get(&self.path).cloned()
    }

    fn set_remote_url(&self, url: &str) -> brick_package::Result<()> {
        self.world
            .borrow_mut()
            .remote_of
            .insert(self.path.clone(), url.to_string());
        Ok(())
    }

    fn has_write_permission(&self) -> bool {
        self.world.borrow().writable
    }

    fn is_latest(&self) -> (bool, bool) {
        let world = self.world.borrow();
        (world.up_to_date, world.reachable)
    }

    fn list_tags(&self) -> Vec<String> {
        self.world
            .borrow()
            .tags
            .get(&self.path)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn branch(&self) -> Option<String> {
        Some("main".to_string())
    }
}

#[derive(Clone, Default)]
pub struct FakeVcs {
    pub world: Rc<RefCell<World>>,
}

impl FakeVcs {
    pub fn repo(&self, path: &Path) -> FakeRepo {
        FakeRepo {
            path: path.to_path_buf(),
            world: self.world.clone(),
        }
    }

    pub fn init(&self, path: &Path) {
        self.world
            .borrow_mut()
            .tags
            .entry(path.to_path_buf())
            .or_default();
    }

    pub fn tags_of(&self, path: &Path) -> Vec<String> {
        self.repo(path).list_tags()
    }

    pub fn log(&self) -> Vec<String> {
        self.world.borrow().log.clone()
    }
}

impl Vcs for FakeVcs {
    fn open(&self, path: &Path) -> Option<Box<dyn Repository>> {
        if self.world.borrow().tags.contains_key(path) {
            Some(Box::new(self.repo(path)))
        } else {
            None
        }
    }

    fn clone_repository(&self, source: &str, dest: &Path) -> brick_package::Result<Box<dyn Repository>> {
        let src = {
            let world = self.world.borrow();
            world
                .remotes
                .get(source)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(source))
        };
        let tags = self
            .world
            .borrow()
            .tags
            .get(&src)
            .cloned()
            .ok_or_else(|| PackageError::vcs("clone", format!("{} is not a repository", source)))?;
        brick_package::cache::copy_tree(&src, dest, true, |_| true)?;

        let mut world = self.world.borrow_mut();
        world.tags.insert(dest.to_path_buf(), tags);
        world.remote_of.insert(dest.to_path_buf(), source.to_string());
        drop(world);
        Ok(Box::new(self.repo(dest)))
    }

    fn is_valid_remote(&self, url: &str) -> bool {
        self.world.borrow().remotes.contains_key(url)
    }

    fn is_blank_remote(&self, _url: &str) -> bool {
        false
    }
}

/// A temporary workspace, cache and vendor area.
pub struct Sandbox {
    pub tmp: TempDir,
    pub vcs: FakeVcs,
    pub vendors: Vec<VendorIndex>,
}

pub struct BlockSpec<'a> {
    pub library: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub vendor: &'a str,
    pub remote: &'a str,
    pub requires: &'a [&'a str],
    pub files: &'a [(&'a str, &'a str)],
}

impl<'a> BlockSpec<'a> {
    pub fn new(library: &'a str, name: &'a str) -> Self {
        Self {
            library,
            name,
            version: "0.0.0",
            vendor: "",
            remote: "",
            requires: &[],
            files: &[],
        }
    }
}

pub fn marker_text(spec: &BlockSpec) -> String {
    let requires: Vec<String> = spec.requires.iter().map(|r| format!("\"{}\"", r)).collect();
    format!(
        "[block]\nname = \"{}\"\nlibrary = \"{}\"\nversion = \"{}\"\nremote = \"{}\"\n\
         vendor = \"{}\"\nrequires = [{}]\n",
        spec.name,
        spec.library,
        spec.version,
        spec.remote,
        spec.vendor,
        requires.join(", ")
    )
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("workspace")).unwrap();
        Self {
            tmp,
            vcs: FakeVcs::default(),
            vendors: Vec::new(),
        }
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.tmp.path().join("workspace")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.tmp.path().join("cache")
    }

    /// Create a working copy with its own repository.
    pub fn block(&self, spec: &BlockSpec) -> PathBuf {
        let dir = self.workspace_root().join(spec.name);
        self.write_block(&dir, spec);
        self.vcs.init(&dir);
        dir
    }

    pub fn write_block(&self, dir: &Path, spec: &BlockSpec) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MARKER), marker_text(spec)).unwrap();
        for (rel, content) in spec.files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    /// Set the marker version and tag the working tree as a release.
    pub fn release_as(&self, dir: &Path, version: &str) {
        let mut meta = BlockMetadata::load(dir).unwrap();
        meta.block.version = Some(version.to_string());
        meta.save(dir).unwrap();
        self.vcs.repo(dir).tag(&format!("v{}-brick", version)).unwrap();
    }

    /// Create a vendor index repository listing `spec`.
    pub fn vendor(&mut self, name: &str, listings: &[BlockSpec]) -> PathBuf {
        let root = self.tmp.path().join("vendors").join(name);
        fs::create_dir_all(&root).unwrap();
        for spec in listings {
            let dir = root.join(spec.library).join(spec.name);
            self.write_block(&dir, spec);
        }
        self.vcs.init(&root);
        self.vendors.push(VendorIndex {
            name: name.to_string(),
            path: root.clone(),
        });
        root
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            workspace_path: Some(self.workspace_root()),
            cache_path: self.cache_root(),
            vendors: self.vendors.clone(),
            ..EngineSettings::default()
        }
    }

    pub fn load_with(&self, prompter: Box<dyn Prompter>) -> Workspace {
        Workspace::load(
            self.settings(),
            Box::new(self.vcs.clone()),
            prompter,
            Box::new(SurfaceLexer::new().unwrap()),
        )
        .unwrap()
    }

    pub fn load(&self) -> Workspace {
        self.load_with(Box::new(AutoConfirm))
    }
}

pub fn key(library: &str, name: &str) -> Identifier {
    Identifier::new("", library, name)
}

pub fn downloaded(library: &str, name: &str) -> BlockRef {
    BlockRef::new(&key(library, name), Level::Downloaded)
}

pub fn installed(library: &str, name: &str) -> BlockRef {
    BlockRef::new(&key(library, name), Level::Installed)
}

pub const MUX_VHD: &str = "\
entity mux is
  port (a : in bit; s : out bit);
end entity;

architecture rtl of mux is
begin
  s <= a;
end architecture;
";

pub const ADDER_VHD: &str = "\
entity adder is
  port (a : in bit; s : out bit);
end entity;

architecture rtl of adder is
begin
  u_mux : entity logic.mux port map (a => a, s => s);
end architecture;
";

pub const ADDER_TB_VHD: &str = "\
entity adder_tb is
end entity;

architecture sim of adder_tb is
begin
  dut : entity work.adder port map (a => a, s => s);
end architecture;
";

pub const PLAIN_ADDER_VHD: &str = "\
entity adder is
  port (a : in bit; s : out bit);
end entity;

architecture rtl of adder is
begin
  s <= a;
end architecture;
";
