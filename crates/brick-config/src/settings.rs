//! Global Settings (~/.brickyard/config.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TAG_SUFFIX: &str = "-brick";
pub const DEFAULT_VHDL_EXTENSIONS: [&str; 2] = ["vhd", "vhdl"];
pub const DEFAULT_VERILOG_EXTENSIONS: [&str; 2] = ["v", "sv"];

/// Scalar settings addressable by dotted key.
pub const KEYS: [&str; 8] = [
    "general.author",
    "general.editor",
    "general.multi-develop",
    "general.tag-suffix",
    "workspace.path",
    "workspace.cache",
    "sources.vhdl",
    "sources.verilog",
];

/// Global user settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general: Option<GeneralConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourcesConfig>,

    /// Vendor index repositories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendors: Vec<VendorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Program used to edit changelogs during a release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,

    /// Resolve units against working copies before installed copies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_develop: Option<bool>,

    /// Appended to `vX.Y.Z` when tagging releases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Root scanned for working copies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Installation cache root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
}

/// File extensions recognized as HDL sources, without the dot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vhdl: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verilog: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    pub name: String,
    pub path: PathBuf,
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Write settings as pretty TOML, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(suffix) = self.general.as_ref().and_then(|g| g.tag_suffix.as_deref()) {
            if !suffix.starts_with('-') || suffix.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    field: "general.tag-suffix".to_string(),
                    reason: format!("must start with '-' and contain no whitespace, got '{}'", suffix),
                });
            }
        }

        if let Some(sources) = &self.sources {
            validate_extensions("sources.vhdl", sources.vhdl.as_deref())?;
            validate_extensions("sources.verilog", sources.verilog.as_deref())?;
        }

        let mut seen: Vec<String> = Vec::new();
        for vendor in &self.vendors {
            if vendor.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "vendor name cannot be empty".to_string(),
                ));
            }
            let lowered = vendor.name.to_lowercase();
            if seen.contains(&lowered) {
                return Err(ConfigError::ValidationError(format!(
                    "vendor '{}' is listed more than once",
                    vendor.name
                )));
            }
            seen.push(lowered);
        }

        Ok(())
    }

    pub fn author(&self) -> Option<&str> {
        self.general.as_ref().and_then(|g| g.author.as_deref())
    }

    pub fn editor(&self) -> Option<&str> {
        self.general.as_ref().and_then(|g| g.editor.as_deref())
    }

    pub fn multi_develop(&self) -> bool {
        self.general
            .as_ref()
            .and_then(|g| g.multi_develop)
            .unwrap_or(false)
    }

    pub fn tag_suffix(&self) -> &str {
        self.general
            .as_ref()
            .and_then(|g| g.tag_suffix.as_deref())
            .unwrap_or(DEFAULT_TAG_SUFFIX)
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().and_then(|w| w.path.as_deref())
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.workspace.as_ref().and_then(|w| w.cache.as_deref())
    }

    pub fn vhdl_extensions(&self) -> Vec<String> {
        self.sources
            .as_ref()
            .and_then(|s| s.vhdl.clone())
            .unwrap_or_else(|| DEFAULT_VHDL_EXTENSIONS.iter().map(|e| e.to_string()).collect())
    }

    pub fn verilog_extensions(&self) -> Vec<String> {
        self.sources
            .as_ref()
            .and_then(|s| s.verilog.clone())
            .unwrap_or_else(|| {
                DEFAULT_VERILOG_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect()
            })
    }

    /// Current value of a dotted key, `None` when unset.
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        let general = self.general.as_ref();
        let workspace = self.workspace.as_ref();
        let sources = self.sources.as_ref();
        let display = |p: &PathBuf| p.display().to_string();

        let value = match key {
            "general.author" => general.and_then(|g| g.author.clone()),
            "general.editor" => general.and_then(|g| g.editor.clone()),
            "general.multi-develop" => general.and_then(|g| g.multi_develop).map(|b| b.to_string()),
            "general.tag-suffix" => general.and_then(|g| g.tag_suffix.clone()),
            "workspace.path" => workspace.and_then(|w| w.path.as_ref()).map(display),
            "workspace.cache" => workspace.and_then(|w| w.cache.as_ref()).map(display),
            "sources.vhdl" => sources.and_then(|s| s.vhdl.as_ref()).map(|v| v.join(",")),
            "sources.verilog" => sources.and_then(|s| s.verilog.as_ref()).map(|v| v.join(",")),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set a dotted key from its text form. Lists are comma-separated and
    /// an empty value clears the key. The result is validated.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());
        let list = || {
            text.as_ref().map(|t| {
                t.split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_string())
                    .filter(|e| !e.is_empty())
                    .collect::<Vec<_>>()
            })
        };

        match key {
            "general.author" => self.general_mut().author = text.clone(),
            "general.editor" => self.general_mut().editor = text.clone(),
            "general.multi-develop" => {
                self.general_mut().multi_develop = match text.as_deref() {
                    None => None,
                    Some(raw) => Some(parse_bool(raw).ok_or_else(|| ConfigError::InvalidValue {
                        field: key.to_string(),
                        reason: format!("expected true or false, got '{}'", raw),
                    })?),
                }
            }
            "general.tag-suffix" => self.general_mut().tag_suffix = text.clone(),
            "workspace.path" => self.workspace_mut().path = text.as_ref().map(PathBuf::from),
            "workspace.cache" => self.workspace_mut().cache = text.as_ref().map(PathBuf::from),
            "sources.vhdl" => self.sources_mut().vhdl = list(),
            "sources.verilog" => self.sources_mut().verilog = list(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        self.validate()
    }

    /// Every addressable key with its value, unset keys included.
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        KEYS.iter()
            .map(|k| (*k, self.get(k).ok().flatten()))
            .collect()
    }

    fn general_mut(&mut self) -> &mut GeneralConfig {
        self.general.get_or_insert_with(GeneralConfig::default)
    }

    fn workspace_mut(&mut self) -> &mut WorkspaceConfig {
        self.workspace.get_or_insert_with(WorkspaceConfig::default)
    }

    fn sources_mut(&mut self) -> &mut SourcesConfig {
        self.sources.get_or_insert_with(SourcesConfig::default)
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate_extensions(field: &str, extensions: Option<&[String]>) -> ConfigResult<()> {
    let Some(extensions) = extensions else {
        return Ok(());
    };
    if extensions.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "at least one extension is required".to_string(),
        });
    }
    for ext in extensions {
        if ext.is_empty() || ext.contains('.') {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("extension '{}' must be non-empty and have no dot", ext),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_settings() {
        let toml = r#"
[general]
author = "Jane Doe"
editor = "code"
multi-develop = true
tag-suffix = "-hdl"

[workspace]
path = "/home/jane/hdl"
cache = "/home/jane/.brickyard/cache"

[sources]
vhdl = ["vhd"]
verilog = ["v", "sv"]

[[vendors]]
name = "acme"
path = "/home/jane/.brickyard/vendors/acme"
"#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.author(), Some("Jane Doe"));
        assert!(settings.multi_develop());
        assert_eq!(settings.tag_suffix(), "-hdl");
        assert_eq!(settings.vhdl_extensions(), vec!["vhd"]);
        assert_eq!(settings.vendors.len(), 1);
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.tag_suffix(), DEFAULT_TAG_SUFFIX);
        assert!(!settings.multi_develop());
        assert_eq!(settings.vhdl_extensions(), vec!["vhd", "vhdl"]);
        assert_eq!(settings.verilog_extensions(), vec!["v", "sv"]);
        assert_eq!(settings.workspace_path(), None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<Settings, _> = toml::from_str("[general]\ncolour = \"red\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_tag_suffix() {
        let mut settings = Settings::default();
        assert!(settings.set("general.tag-suffix", "brick").is_err());
        assert!(settings.set("general.tag-suffix", "-my tag").is_err());
        settings.set("general.tag-suffix", "-ok").unwrap();
        assert_eq!(settings.tag_suffix(), "-ok");
    }

    #[test]
    fn test_duplicate_vendor_names() {
        let settings = Settings {
            vendors: vec![
                VendorConfig {
                    name: "Acme".into(),
                    path: "/a".into(),
                },
                VendorConfig {
                    name: "acme".into(),
                    path: "/b".into(),
                },
            ],
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_get_and_set_round_trip() {
        let mut settings = Settings::default();
        settings.set("general.multi-develop", "yes").unwrap();
        settings.set("sources.vhdl", "vhd, .vhdl").unwrap();
        settings.set("workspace.path", "/work").unwrap();

        assert_eq!(settings.get("general.multi-develop").unwrap(), Some("true".into()));
        assert_eq!(settings.get("sources.vhdl").unwrap(), Some("vhd,vhdl".into()));
        assert_eq!(settings.get("workspace.path").unwrap(), Some("/work".into()));

        settings.set("workspace.path", "").unwrap();
        assert_eq!(settings.get("workspace.path").unwrap(), None);

        assert!(matches!(
            settings.get("general.colour"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(settings.set("general.multi-develop", "maybe").is_err());
    }

    #[test]
    fn test_entries_cover_every_key() {
        let entries = Settings::default().entries();
        assert_eq!(entries.len(), KEYS.len());
        assert!(entries.iter().all(|(_, v)| v.is_none()));
    }
}
