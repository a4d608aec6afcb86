//! HDL design units and a surface-level lexer
//!
//! Only enough structure is recovered to order files for a build: unit
//! declarations, whether a design has ports, and which other units each
//! one references.

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::level::{BlockRef, Level};
use crate::{PackageError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Vhdl,
    Verilog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// VHDL entity or Verilog module.
    Design,
    Package,
}

/// Reference from one unit to another by name and optional library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitRef {
    pub name: String,
    /// `None` when the source gives no library or names `work`.
    pub library: Option<String>,
}

impl UnitRef {
    pub fn new(library: Option<&str>, name: &str) -> Self {
        let library = library
            .filter(|l| !l.eq_ignore_ascii_case("work"))
            .map(str::to_string);
        Self {
            name: name.to_string(),
            library,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HdlUnit {
    pub name: String,
    pub kind: UnitKind,
    pub language: Language,
    pub file: PathBuf,
    pub has_ports: bool,
    pub dependencies: Vec<UnitRef>,
}

impl HdlUnit {
    /// A design without ports is treated as a testbench.
    pub fn is_bench(&self) -> bool {
        self.kind == UnitKind::Design && !self.has_ports
    }

    pub fn is_package(&self) -> bool {
        self.kind == UnitKind::Package
    }
}

/// Extracts units from one source file.
pub trait UnitLexer {
    fn units(&self, file: &Path, language: Language) -> Result<Vec<HdlUnit>>;
}

const VERILOG_KEYWORDS: &[&str] = &[
    "module", "endmodule", "input", "output", "inout", "wire", "reg", "logic", "assign",
    "always", "always_ff", "always_comb", "initial", "if", "else", "for", "while", "case",
    "begin", "end", "function", "task", "parameter", "localparam", "integer", "genvar",
    "generate", "return", "typedef", "import", "package", "endpackage", "repeat", "forever",
];

/// Regex-driven lexer for the surface structure of VHDL and Verilog.
pub struct SurfaceLexer {
    vhdl_entity: Regex,
    vhdl_package: Regex,
    vhdl_body: Regex,
    vhdl_arch: Regex,
    vhdl_use: Regex,
    vhdl_direct: Regex,
    vhdl_component: Regex,
    vhdl_end: Regex,
    vhdl_port: Regex,
    vlog_module: Regex,
    vlog_package: Regex,
    vlog_import: Regex,
    vlog_instance: Regex,
    vlog_port: Regex,
    vlog_block_comment: Regex,
}

fn pattern(text: &str) -> Result<Regex> {
    RegexBuilder::new(text)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(PackageError::from)
}

impl SurfaceLexer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            vhdl_entity: pattern(r"^\s*entity\s+(\w+)\s+is\b")?,
            vhdl_package: pattern(r"^\s*package\s+(\w+)\s+is\b")?,
            vhdl_body: pattern(r"^\s*package\s+body\s+(\w+)\s+is\b")?,
            vhdl_arch: pattern(r"^\s*architecture\s+\w+\s+of\s+(\w+)\s+is\b")?,
            vhdl_use: pattern(r"\buse\s+(\w+)\.(\w+)\.\w+\s*;")?,
            vhdl_direct: pattern(r"\bentity\s+(\w+)\.(\w+)")?,
            vhdl_component: pattern(
                r"\b\w+\s*:\s*(?:component\s+)?(\w+)\s+(?:generic|port)\s+map\b",
            )?,
            vhdl_end: pattern(r"\bend\b")?,
            vhdl_port: pattern(r"\bport\s*\(")?,
            vlog_module: pattern(r"^\s*module\s+(\w+)")?,
            vlog_package: pattern(r"^\s*package\s+(\w+)\s*;")?,
            vlog_import: pattern(r"\bimport\s+(\w+)::")?,
            vlog_instance: pattern(r"^\s*(\w+)\s*(?:#\s*\([^;]*?\))?\s+(\w+)\s*\(")?,
            vlog_port: pattern(r"\b(?:input|output|inout)\b")?,
            vlog_block_comment: RegexBuilder::new(r"/\*.*?\*/")
                .dot_matches_new_line(true)
                .build()?,
        })
    }

    /// Lex source text without touching the filesystem.
    pub fn scan(&self, text: &str, file: &Path, language: Language) -> Vec<HdlUnit> {
        match language {
            Language::Vhdl => self.scan_vhdl(&strip_line_comments(text, "--"), file),
            Language::Verilog => {
                let text = self.vlog_block_comment.replace_all(text, " ");
                self.scan_verilog(&strip_line_comments(&text, "//"), file)
            }
        }
    }

    fn scan_vhdl(&self, text: &str, file: &Path) -> Vec<HdlUnit> {
        let mut units: Vec<HdlUnit> = Vec::new();
        // (offset, owning unit name)
        let mut markers: Vec<(usize, String)> = Vec::new();

        for cap in self.vhdl_entity.captures_iter(text) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let rest = &text[whole.end()..];
            let decl_end = self.vhdl_end.find(rest).map_or(rest.len(), |m| m.start());
            units.push(HdlUnit {
                name: name.as_str().to_string(),
                kind: UnitKind::Design,
                language: Language::Vhdl,
                file: file.to_path_buf(),
                has_ports: self.vhdl_port.is_match(&rest[..decl_end]),
                dependencies: Vec::new(),
            });
            markers.push((whole.start(), name.as_str().to_string()));
        }
        for cap in self.vhdl_package.captures_iter(text) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            units.push(HdlUnit {
                name: name.as_str().to_string(),
                kind: UnitKind::Package,
                language: Language::Vhdl,
                file: file.to_path_buf(),
                has_ports: false,
                dependencies: Vec::new(),
            });
            markers.push((whole.start(), name.as_str().to_string()));
        }
        for re in [&self.vhdl_body, &self.vhdl_arch] {
            for cap in re.captures_iter(text) {
                if let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) {
                    markers.push((whole.start(), name.as_str().to_string()));
                }
            }
        }
        markers.sort();

        // context clauses precede the unit they apply to
        for cap in self.vhdl_use.captures_iter(text) {
            let (Some(whole), Some(lib), Some(pkg)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            if let Some(owner) = owner_after(&markers, whole.start()) {
                add_dependency(&mut units, &owner, UnitRef::new(Some(lib.as_str()), pkg.as_str()));
            }
        }
        for cap in self.vhdl_direct.captures_iter(text) {
            let (Some(whole), Some(lib), Some(name)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            if let Some(owner) = owner_before(&markers, whole.start()) {
                add_dependency(&mut units, &owner, UnitRef::new(Some(lib.as_str()), name.as_str()));
            }
        }
        for cap in self.vhdl_component.captures_iter(text) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if let Some(owner) = owner_before(&markers, whole.start()) {
                add_dependency(&mut units, &owner, UnitRef::new(None, name.as_str()));
            }
        }
        units
    }

    fn scan_verilog(&self, text: &str, file: &Path) -> Vec<HdlUnit> {
        let mut units: Vec<HdlUnit> = Vec::new();
        let mut markers: Vec<(usize, String)> = Vec::new();

        for cap in self.vlog_module.captures_iter(text) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let rest = &text[whole.end()..];
            let body_end = rest.find("endmodule").unwrap_or(rest.len());
            units.push(HdlUnit {
                name: name.as_str().to_string(),
                kind: UnitKind::Design,
                language: Language::Verilog,
                file: file.to_path_buf(),
                has_ports: self.vlog_port.is_match(&rest[..body_end]),
                dependencies: Vec::new(),
            });
            markers.push((whole.start(), name.as_str().to_string()));
        }
        for cap in self.vlog_package.captures_iter(text) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            units.push(HdlUnit {
                name: name.as_str().to_string(),
                kind: UnitKind::Package,
                language: Language::Verilog,
                file: file.to_path_buf(),
                has_ports: false,
                dependencies: Vec::new(),
            });
            markers.push((whole.start(), name.as_str().to_string()));
        }
        markers.sort();

        for cap in self.vlog_import.captures_iter(text) {
            let (Some(whole), Some(pkg)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let owner = owner_before(&markers, whole.start())
                .or_else(|| owner_after(&markers, whole.start()));
            if let Some(owner) = owner {
                add_dependency(&mut units, &owner, UnitRef::new(None, pkg.as_str()));
            }
        }
        for cap in self.vlog_instance.captures_iter(text) {
            let (Some(whole), Some(module)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let module = module.as_str();
            if VERILOG_KEYWORDS.contains(&module.to_lowercase().as_str()) {
                continue;
            }
            if let Some(owner) = owner_before(&markers, whole.start()) {
                add_dependency(&mut units, &owner, UnitRef::new(None, module));
            }
        }
        units
    }
}

impl UnitLexer for SurfaceLexer {
    fn units(&self, file: &Path, language: Language) -> Result<Vec<HdlUnit>> {
        let bytes = std::fs::read(file).map_err(|e| PackageError::io(file, e))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.scan(&text, file, language))
    }
}

fn strip_line_comments(text: &str, marker: &str) -> String {
    text.lines()
        .map(|line| match line.find(marker) {
            Some(i) => &line[..i],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn owner_before(markers: &[(usize, String)], offset: usize) -> Option<String> {
    markers
        .iter()
        .rev()
        .find(|(at, _)| *at < offset)
        .map(|(_, name)| name.clone())
}

fn owner_after(markers: &[(usize, String)], offset: usize) -> Option<String> {
    markers
        .iter()
        .find(|(at, _)| *at > offset)
        .map(|(_, name)| name.clone())
}

fn add_dependency(units: &mut [HdlUnit], owner: &str, dep: UnitRef) {
    if let Some(unit) = units.iter_mut().find(|u| u.name.eq_ignore_ascii_case(owner)) {
        if !dep.name.eq_ignore_ascii_case(&unit.name) && !unit.dependencies.contains(&dep) {
            unit.dependencies.push(dep);
        }
    }
}

/// Replace whole-word, case-insensitive occurrences of each `(old, new)`
/// unit name in `source`.
pub fn rename_units(source: &str, pairs: &[(String, String)]) -> Result<String> {
    if pairs.is_empty() {
        return Ok(source.to_string());
    }
    let lookup: HashMap<String, &str> = pairs
        .iter()
        .map(|(old, new)| (old.to_lowercase(), new.as_str()))
        .collect();
    let alternation: Vec<String> = pairs.iter().map(|(old, _)| regex::escape(old)).collect();
    let re = pattern(&format!(r"\b(?:{})\b", alternation.join("|")))?;

    let renamed = re.replace_all(source, |caps: &regex::Captures| {
        let found = &caps[0];
        lookup
            .get(&found.to_lowercase())
            .map_or_else(|| found.to_string(), |new| new.to_string())
    });
    Ok(renamed.into_owned())
}

/// A unit together with the block copy that provides it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub unit: HdlUnit,
    pub owner: BlockRef,
    /// Library of the owning block.
    pub library: String,
}

/// Every unit visible to the workspace, indexed for name resolution.
#[derive(Debug, Default)]
pub struct UnitCatalog {
    entries: Vec<CatalogEntry>,
    /// (library, name), lowercased
    by_qualified: HashMap<(String, String), Vec<usize>>,
    /// name, lowercased
    by_name: HashMap<String, Vec<usize>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, owner: &BlockRef, library: &str, units: Vec<HdlUnit>) {
        for unit in units {
            let idx = self.entries.len();
            let name = unit.name.to_lowercase();
            self.by_qualified
                .entry((library.to_lowercase(), name.clone()))
                .or_default()
                .push(idx);
            self.by_name.entry(name).or_default().push(idx);
            self.entries.push(CatalogEntry {
                unit,
                owner: owner.clone(),
                library: library.to_string(),
            });
        }
    }

    pub fn entry(&self, idx: usize) -> &CatalogEntry {
        &self.entries[idx]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the units provided by one block copy.
    pub fn owned_by(&self, owner: &BlockRef) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|i| self.entries[*i].owner == *owner)
            .collect()
    }

    /// Resolve a reference made by the unit at `from`.
    ///
    /// The referencing block's own units win. Otherwise working copies are
    /// preferred over installed copies only with `multi_develop`.
    pub fn resolve(&self, from: usize, dep: &UnitRef, multi_develop: bool) -> Option<usize> {
        let origin = &self.entries[from];
        let name = dep.name.to_lowercase();

        let candidates: &[usize] = match &dep.library {
            Some(lib) => self
                .by_qualified
                .get(&(lib.to_lowercase(), name))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            None => match self.by_qualified.get(&(origin.library.to_lowercase(), name.clone())) {
                Some(found) if !found.is_empty() => found.as_slice(),
                _ => self.by_name.get(&name).map(Vec::as_slice).unwrap_or(&[]),
            },
        };

        let preference = |level: Level| -> u8 {
            match (level, multi_develop) {
                (Level::Downloaded, true) | (Level::Installed, false) => 0,
                (Level::Installed, true) | (Level::Downloaded, false) => 1,
                _ => 2,
            }
        };

        candidates
            .iter()
            .copied()
            .filter(|i| *i != from)
            .min_by_key(|i| {
                let owner = &self.entries[*i].owner;
                let own = owner.key == origin.owner.key && owner.level == origin.owner.level;
                (!own, preference(owner.level))
            })
    }
}
