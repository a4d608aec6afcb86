//! CLI configuration
//!
//! Bridges the global settings file to the engine and builds the
//! per-invocation workspace.

use crate::git::GitCli;
use crate::prompt::TerminalPrompter;
use anyhow::{Context, Result};
use brick_config::{Config, ConfigLoader};
use brick_package::workspace::VendorIndex;
use brick_package::{EngineSettings, SurfaceLexer, Workspace};
use std::env;

/// True when NO_COLOR or BRICK_NO_COLOR is set.
pub fn no_color() -> bool {
    env::var_os("BRICK_NO_COLOR").is_some() || env::var_os("NO_COLOR").is_some()
}

pub fn load() -> Result<Config> {
    ConfigLoader::new()
        .load()
        .context("Failed to load brickyard settings")
}

/// Snapshot of the settings the engine needs.
pub fn engine_settings(config: &Config) -> EngineSettings {
    let settings = &config.settings;
    EngineSettings {
        tag_suffix: settings.tag_suffix().to_string(),
        vhdl_extensions: settings.vhdl_extensions(),
        verilog_extensions: settings.verilog_extensions(),
        multi_develop: settings.multi_develop(),
        workspace_path: settings.workspace_path().map(|p| p.to_path_buf()),
        cache_path: config.cache_path(),
        vendors: settings
            .vendors
            .iter()
            .map(|v| VendorIndex {
                name: v.name.clone(),
                path: v.path.clone(),
            })
            .collect(),
    }
}

/// Scan every configured location into a workspace.
pub fn open_workspace(config: &Config, assume_yes: bool) -> Result<Workspace> {
    let prompter = TerminalPrompter::new(assume_yes, config.settings.editor().map(str::to_string));
    let lexer = SurfaceLexer::new().context("Failed to build HDL lexer")?;
    Workspace::load(
        engine_settings(config),
        Box::new(GitCli),
        Box::new(prompter),
        Box::new(lexer),
    )
    .context("Failed to scan blocks")
}
