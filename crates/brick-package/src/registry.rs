//! Inventory of every known block copy and the block dependency graph

use std::collections::BTreeMap;

use crate::block::BlockRecord;
use crate::graph::DependencyGraph;
use crate::level::{BlockRef, Level, LevelSlots};
use crate::requirement::{BlockNode, Identifier};
use crate::version::Version;
use crate::{PackageError, Result};

/// One line of `brick list`.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRow {
    pub title: String,
    pub downloaded: Option<Version>,
    pub installed: Option<Version>,
    pub available: Option<Version>,
    pub pins: Vec<String>,
}

/// vendor -> library -> name -> slots, all keys lowercased.
#[derive(Default)]
pub struct BlockRegistry {
    blocks: BTreeMap<String, BTreeMap<String, BTreeMap<String, LevelSlots>>>,
    graph: DependencyGraph<BlockNode>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots_entry(&mut self, key: &Identifier) -> &mut LevelSlots {
        self.blocks
            .entry(key.vendor.clone())
            .or_default()
            .entry(key.library.clone())
            .or_default()
            .entry(key.name.clone())
            .or_default()
    }

    /// Register a record. A second record for an occupied level is an error.
    pub fn insert(&mut self, record: BlockRecord) -> Result<BlockRef> {
        let block_ref = record.block_ref();
        let title = record.title();
        let level = record.level();
        let node = BlockNode::new(record.id(), record.version());
        let edges: Vec<BlockNode> = record.requirements().iter().map(|r| r.node()).collect();

        self.slots_entry(&block_ref.key)
            .put(record)
            .map_err(|_| PackageError::LevelOccupied { title, level })?;

        self.graph.add_vertex(node.clone());
        for target in edges {
            self.graph.add_edge(node.clone(), target);
        }
        Ok(block_ref)
    }

    /// Unregister a record and drop empty branches of the tree.
    pub fn remove(&mut self, block_ref: &BlockRef) -> Option<BlockRecord> {
        let key = &block_ref.key;
        let libraries = self.blocks.get_mut(&key.vendor)?;
        let names = libraries.get_mut(&key.library)?;
        let slots = names.get_mut(&key.name)?;
        let removed = slots.take(block_ref.level, block_ref.pin.as_deref());

        if slots.is_empty() {
            names.remove(&key.name);
        }
        if names.is_empty() {
            libraries.remove(&key.library);
        }
        if libraries.is_empty() {
            self.blocks.remove(&key.vendor);
        }

        if removed.is_some() {
            self.rebuild_graph();
        }
        removed
    }

    pub fn slots(&self, key: &Identifier) -> Option<&LevelSlots> {
        let key = key.key();
        self.blocks.get(&key.vendor)?.get(&key.library)?.get(&key.name)
    }

    pub fn get(&self, block_ref: &BlockRef) -> Option<&BlockRecord> {
        self.slots(&block_ref.key)?
            .get(block_ref.level, block_ref.pin.as_deref())
    }

    pub fn get_mut(&mut self, block_ref: &BlockRef) -> Option<&mut BlockRecord> {
        let key = &block_ref.key;
        self.blocks
            .get_mut(&key.vendor)?
            .get_mut(&key.library)?
            .get_mut(&key.name)?
            .get_mut(block_ref.level, block_ref.pin.as_deref())
    }

    /// True if the block has a copy at any level besides `block_ref`.
    pub fn exists_elsewhere(&self, block_ref: &BlockRef) -> bool {
        self.slots(&block_ref.key)
            .map(|s| s.occupied() > 1)
            .unwrap_or(false)
    }

    /// Every registered block key.
    pub fn keys(&self) -> Vec<Identifier> {
        let mut keys = Vec::new();
        for (vendor, libraries) in &self.blocks {
            for (library, names) in libraries {
                for name in names.keys() {
                    keys.push(Identifier::new(vendor.clone(), library.clone(), name.clone()));
                }
            }
        }
        keys
    }

    pub fn records(&self) -> impl Iterator<Item = &BlockRecord> {
        self.blocks
            .values()
            .flat_map(|libs| libs.values())
            .flat_map(|names| names.values())
            .flat_map(|slots| slots.records())
    }

    /// Resolve `[vendor.]library.name` case-insensitively.
    ///
    /// Without a vendor the library and name must match exactly one block
    /// across all vendors; several matches are reported as ambiguous.
    pub fn find(&self, query: &str) -> Result<Identifier> {
        let wanted: Identifier = query.parse()?;
        let wanted = wanted.key();
        let explicit_vendor = query.trim().split('.').count() == 3;

        let matches: Vec<Identifier> = self
            .keys()
            .into_iter()
            .filter(|k| k.library == wanted.library && k.name == wanted.name)
            .filter(|k| !explicit_vendor || k.vendor == wanted.vendor)
            .collect();

        match matches.len() {
            0 => Err(PackageError::BlockNotFound(query.to_string())),
            1 => Ok(matches.into_iter().next().unwrap_or(wanted)),
            _ => Err(PackageError::AmbiguousBlock {
                query: query.to_string(),
                candidates: matches
                    .iter()
                    .filter_map(|k| self.slots(k).and_then(|s| s.representative()))
                    .map(|r| r.title())
                    .collect(),
            }),
        }
    }

    /// Recompute the block graph from every record's requirement list.
    pub fn rebuild_graph(&mut self) {
        let mut graph = DependencyGraph::new();
        for record in self.records() {
            let node = BlockNode::new(record.id(), record.version());
            graph.add_vertex(node.clone());
            for req in record.requirements() {
                graph.add_edge(node.clone(), req.node());
            }
        }
        self.graph = graph;
    }

    pub fn graph(&self) -> &DependencyGraph<BlockNode> {
        &self.graph
    }

    pub fn inventory(&self) -> Vec<InventoryRow> {
        let mut rows = Vec::new();
        for key in self.keys() {
            let Some(slots) = self.slots(&key) else {
                continue;
            };
            let Some(representative) = slots.representative() else {
                continue;
            };
            rows.push(InventoryRow {
                title: representative.title(),
                downloaded: slots.downloaded.as_ref().map(|r| r.version()),
                installed: slots.installed.as_ref().map(|r| r.version()),
                available: slots.available.as_ref().map(|r| r.version()),
                pins: slots.versioned.keys().cloned().collect(),
            });
        }
        rows
    }

    /// References to every record at `level`.
    pub fn refs_at(&self, level: Level) -> Vec<BlockRef> {
        self.records()
            .filter(|r| r.level() == level)
            .map(|r| r.block_ref())
            .collect()
    }
}
