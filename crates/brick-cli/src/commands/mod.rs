//! `brick` subcommands, one module per command

pub mod config;
pub mod export;
pub mod install;
pub mod list;
pub mod release;
pub mod remove;
pub mod uninstall;

use anyhow::{Context, Result};
use brick_config::Config;
use brick_package::{BlockRef, Identifier, Level, Workspace};
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Global options and settings shared by every command.
pub struct Session {
    pub config: Config,
    /// Answer yes to every confirmation.
    pub assume_yes: bool,
    pub quiet: bool,
}

impl Session {
    pub fn workspace(&self) -> Result<Workspace> {
        crate::config::open_workspace(&self.config, self.assume_yes)
    }

    /// Spinner on stderr, hidden when quiet.
    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.green} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

/// The working copy enclosing the current directory.
pub fn current_block(ws: &Workspace) -> Result<BlockRef> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    ws.current_block(&cwd).with_context(|| {
        format!(
            "{} is not inside a block working copy",
            cwd.display()
        )
    })
}

/// First level at which `id` is registered, in `levels` order.
pub fn first_ref(ws: &Workspace, id: &Identifier, levels: &[Level]) -> Option<BlockRef> {
    levels
        .iter()
        .map(|level| BlockRef::new(id, *level))
        .find(|block_ref| ws.registry.get(block_ref).is_some())
}

pub fn green_check() -> ColoredString {
    "\u{2713}".green().bold()
}

pub fn yellow_warning() -> ColoredString {
    "\u{26A0}".yellow().bold()
}

pub fn red_cross() -> ColoredString {
    "\u{2717}".red().bold()
}
