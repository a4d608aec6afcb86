//! Marker file parsing and types (Block.toml)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::requirement::Requirement;
use crate::version::Version;
use crate::{PackageError, Result};

/// File whose presence makes a directory a block.
pub const MARKER: &str = "Block.toml";

/// Keys every marker file must carry in its `[block]` section.
pub const REQUIRED_KEYS: [&str; 6] = ["name", "library", "version", "remote", "vendor", "requires"];

/// Marker file document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlockMetadata {
    #[serde(default)]
    pub block: BlockSection,
    /// Any other section, written back untouched.
    #[serde(flatten)]
    pub other: toml::Table,
}

/// The `[block]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct BlockSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<Requirement>>,

    // derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhdl_units: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlog_units: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toplevel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bench: Option<String>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl BlockMetadata {
    /// Parse metadata from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load the marker file inside `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MARKER);
        if !path.is_file() {
            return Err(PackageError::MissingMarker {
                path: dir.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| PackageError::io(&path, e))?;
        Self::from_str(&content).map_err(|source| PackageError::ParseError { path, source })
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Write the marker file inside `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MARKER);
        let content = self.to_string()?;
        std::fs::write(&path, content).map_err(|e| PackageError::io(&path, e))
    }

    /// True if `dir` holds a marker file.
    pub fn is_block_dir(dir: &Path) -> bool {
        dir.join(MARKER).is_file()
    }

    /// Required keys that are absent from the `[block]` section.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let b = &self.block;
        let present = [
            b.name.is_some(),
            b.library.is_some(),
            b.version.is_some(),
            b.remote.is_some(),
            b.vendor.is_some(),
            b.requires.is_some(),
        ];
        REQUIRED_KEYS
            .iter()
            .zip(present)
            .filter(|(_, p)| !p)
            .map(|(k, _)| *k)
            .collect()
    }

    /// First problem that makes this metadata unusable as a release point.
    pub fn defect(&self) -> Option<String> {
        if let Some(key) = self.missing_fields().first() {
            return Some(format!("missing required metadata key: {}", key));
        }
        if self.name().is_empty() {
            return Some("empty metadata key: name".to_string());
        }
        if self.library().is_empty() {
            return Some("empty metadata key: library".to_string());
        }
        None
    }

    /// Fill in every absent required key with an empty value. Returns true
    /// if anything changed.
    pub fn secure(&mut self) -> bool {
        let b = &mut self.block;
        let before = b.clone();
        b.name.get_or_insert_with(String::new);
        b.library.get_or_insert_with(String::new);
        b.version.get_or_insert_with(|| Version::ZERO.bare());
        b.remote.get_or_insert_with(String::new);
        b.vendor.get_or_insert_with(String::new);
        b.requires.get_or_insert_with(Vec::new);
        *b != before
    }

    pub fn name(&self) -> &str {
        self.block.name.as_deref().unwrap_or("")
    }

    pub fn library(&self) -> &str {
        self.block.library.as_deref().unwrap_or("")
    }

    pub fn vendor(&self) -> &str {
        self.block.vendor.as_deref().unwrap_or("")
    }

    pub fn remote(&self) -> &str {
        self.block.remote.as_deref().unwrap_or("")
    }

    pub fn version(&self) -> Version {
        Version::parse(self.block.version.as_deref().unwrap_or(""))
    }

    pub fn set_version(&mut self, version: Version) {
        self.block.version = Some(version.bare());
    }

    pub fn requires(&self) -> &[Requirement] {
        self.block.requires.as_deref().unwrap_or(&[])
    }
}
