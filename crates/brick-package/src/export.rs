//! Build recipe export
//!
//! A recipe lists every source file needed to build a block's top-level
//! unit, dependencies first, tagged for the downstream tool:
//!
//! ```text
//! @LIB <library> <file>   unit from another block
//! @SIM <file>             testbench in this block
//! @SRC <file>             design or package in this block
//! @SIM-TOP <bench>
//! @SRC-TOP <top>
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::graph::DependencyGraph;
use crate::level::BlockRef;
use crate::unit::UnitCatalog;
use crate::workspace::Workspace;
use crate::{PackageError, Result};

pub const RECIPE_FILE: &str = "recipe";
pub const BUILD_DIR: &str = "build";

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub lines: Vec<String>,
    /// Where the recipe was written.
    pub path: PathBuf,
    /// Units in build order as `library.unit`.
    pub order: Vec<String>,
    /// Block titles in build order; the exported block is last.
    pub block_order: Vec<String>,
    /// Rendered dependency tree below the top unit.
    pub tree: String,
    pub top: Option<String>,
    pub bench: Option<String>,
}

impl Workspace {
    /// Write `build/recipe` for a block.
    ///
    /// `top` names the top-level unit; a testbench is accepted as well.
    /// Without it the top is detected from the block's own units and the
    /// prompter breaks ties.
    pub fn export(&self, block_ref: &BlockRef, top: Option<&str>) -> Result<Recipe> {
        let record = self.record(block_ref)?;
        let title = record.title();
        let catalog = self.catalog()?;
        let multi_develop = self.settings.multi_develop;
        let own = catalog.owned_by(block_ref);

        let (design, bench) = match top {
            Some(name) => {
                let idx = own
                    .iter()
                    .copied()
                    .find(|i| catalog.entry(*i).unit.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| PackageError::UnitNotFound {
                        title: title.clone(),
                        unit: name.to_string(),
                    })?;
                if catalog.entry(idx).unit.is_bench() {
                    (None, Some(idx))
                } else {
                    (Some(idx), self.detect_bench(&catalog, &own, idx, multi_develop))
                }
            }
            None => {
                let design = self.detect_top(&catalog, &own, multi_develop);
                let bench = design.and_then(|d| self.detect_bench(&catalog, &own, d, multi_develop));
                (design, bench)
            }
        };

        let mut graph: DependencyGraph<usize> = DependencyGraph::new();
        let roots: Vec<usize> = match bench.or(design) {
            Some(top_dog) => vec![top_dog],
            None => own.clone(),
        };
        let mut stack = roots.clone();
        let mut visited: HashSet<usize> = HashSet::new();
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            graph.add_vertex(idx);
            for dep in &catalog.entry(idx).unit.dependencies {
                match catalog.resolve(idx, dep, multi_develop) {
                    Some(target) => {
                        graph.add_edge(idx, target);
                        stack.push(target);
                    }
                    None => debug!(
                        "Unresolved reference {} from {}",
                        dep.name,
                        catalog.entry(idx).unit.name
                    ),
                }
            }
        }

        let mut topo = graph.topological_sort(|idx| catalog.entry(*idx).owner.clone())?;
        if topo.block_order.contains(block_ref) {
            topo.block_order.retain(|b| b != block_ref);
            topo.block_order.push(block_ref.clone());
        }

        let top_name = design.map(|i| catalog.entry(i).unit.name.clone());
        let bench_name = bench.map(|i| catalog.entry(i).unit.name.clone());
        let lines = recipe_lines(&catalog, &topo.order, block_ref, top_name.as_deref(), bench_name.as_deref());

        let build_dir = record.path().join(BUILD_DIR);
        crate::cache::remove_tree(&build_dir)?;
        std::fs::create_dir_all(&build_dir).map_err(|e| PackageError::io(&build_dir, e))?;
        let path = build_dir.join(RECIPE_FILE);
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content).map_err(|e| PackageError::io(&path, e))?;
        info!("Recipe located at: {}", path.display());

        let label = |idx: &usize| {
            let entry = catalog.entry(*idx);
            format!("{}.{}", entry.library, entry.unit.name)
        };
        let tree = match roots.as_slice() {
            [root] => graph.render_tree(root, |idx| catalog.entry(*idx).unit.is_package(), &label),
            _ => String::from("--- DEPENDENCY TREE ---\n"),
        };

        let mut block_order = Vec::new();
        for owner in &topo.block_order {
            block_order.push(self.record(owner)?.title());
        }

        Ok(Recipe {
            lines,
            path,
            order: topo.order.iter().map(&label).collect(),
            block_order,
            tree,
            top: top_name,
            bench: bench_name,
        })
    }

    /// Own designs that no other own design instantiates.
    fn detect_top(&self, catalog: &UnitCatalog, own: &[usize], multi_develop: bool) -> Option<usize> {
        let used: HashSet<usize> = own
            .iter()
            .filter(|i| !catalog.entry(**i).unit.is_bench())
            .flat_map(|i| {
                catalog
                    .entry(*i)
                    .unit
                    .dependencies
                    .iter()
                    .filter_map(move |dep| catalog.resolve(*i, dep, multi_develop))
            })
            .collect();

        let contenders: Vec<usize> = own
            .iter()
            .copied()
            .filter(|i| {
                let unit = &catalog.entry(*i).unit;
                !unit.is_bench() && !unit.is_package() && !used.contains(i)
            })
            .collect();

        self.choose(catalog, &contenders, "Multiple top-level units identified; select one")
    }

    /// Own testbench instantiating `design`.
    fn detect_bench(
        &self,
        catalog: &UnitCatalog,
        own: &[usize],
        design: usize,
        multi_develop: bool,
    ) -> Option<usize> {
        let benches: Vec<usize> = own
            .iter()
            .copied()
            .filter(|i| {
                let unit = &catalog.entry(*i).unit;
                unit.is_bench()
                    && unit
                        .dependencies
                        .iter()
                        .any(|dep| catalog.resolve(*i, dep, multi_develop) == Some(design))
            })
            .collect();

        self.choose(catalog, &benches, "Multiple testbenches identified; select one")
    }

    fn choose(&self, catalog: &UnitCatalog, candidates: &[usize], prompt: &str) -> Option<usize> {
        match candidates {
            [] => None,
            [only] => Some(*only),
            _ => {
                let names: Vec<String> = candidates
                    .iter()
                    .map(|i| catalog.entry(*i).unit.name.clone())
                    .collect();
                self.prompter()
                    .select(prompt, &names)
                    .and_then(|pick| candidates.get(pick).copied())
            }
        }
    }
}

/// Recipe lines for units in build order, each file listed once.
fn recipe_lines(
    catalog: &UnitCatalog,
    order: &[usize],
    current: &BlockRef,
    top: Option<&str>,
    bench: Option<&str>,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for idx in order {
        let entry = catalog.entry(*idx);
        let file = entry.unit.file.display();
        let line = if entry.owner != *current {
            format!("@LIB {} {}", entry.library, file)
        } else if entry.unit.is_bench() {
            format!("@SIM {}", file)
        } else {
            format!("@SRC {}", file)
        };
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    if let Some(bench) = bench {
        lines.push(format!("@SIM-TOP {}", bench));
    }
    if let Some(top) = top {
        lines.push(format!("@SRC-TOP {}", top));
    }
    lines
}
