//! Configuration Loader
//!
//! Locates the brickyard home, reads its settings file and applies
//! environment variable overrides.

use crate::settings::{parse_bool, Settings};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

pub const HOME_DIR_NAME: &str = ".brickyard";
pub const SETTINGS_FILE: &str = "config.toml";
pub const CACHE_DIR: &str = "cache";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. `$BRICK_HOME/config.toml` (default `~/.brickyard/config.toml`)
/// 3. Environment variables (`BRICK_EDITOR`, `BRICK_AUTHOR`,
///    `BRICK_MULTI_DEVELOP`, `BRICK_WORKSPACE`, `BRICK_CACHE`)
/// 4. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Explicit home directory, bypassing `BRICK_HOME`
    home: Option<PathBuf>,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings with environment overrides applied
    pub settings: Settings,

    /// Brickyard home directory
    pub home: PathBuf,

    /// Settings file location, which may not exist yet
    pub path: PathBuf,
}

impl Config {
    /// Installation cache root, `<home>/cache` unless configured.
    pub fn cache_path(&self) -> PathBuf {
        self.settings
            .cache_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.home.join(CACHE_DIR))
    }

    /// Settings exactly as stored on disk, without environment overrides.
    pub fn stored_settings(&self) -> ConfigResult<Settings> {
        if self.path.exists() {
            Settings::load_from_file(&self.path)
        } else {
            Ok(Settings::default())
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { home: None }
    }

    /// Use `home` instead of `BRICK_HOME` or `~/.brickyard`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    /// Resolve the home directory, read the settings file if present and
    /// apply environment overrides.
    pub fn load(&self) -> ConfigResult<Config> {
        let home = self.home_dir()?;
        let path = home.join(SETTINGS_FILE);

        let settings = if path.exists() {
            Settings::load_from_file(&path)?
        } else {
            Settings::default()
        };

        let mut settings = apply_env_overrides(settings)?;
        expand_paths(&mut settings)?;

        Ok(Config {
            settings,
            home,
            path,
        })
    }

    /// Create the home directory if missing and return it.
    pub fn ensure_home_dir(&self) -> ConfigResult<PathBuf> {
        let home = self.home_dir()?;
        if !home.exists() {
            std::fs::create_dir_all(&home)?;
        }
        Ok(home)
    }

    fn home_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(home) = &self.home {
            return Ok(home.clone());
        }
        match env::var("BRICK_HOME") {
            Ok(home) if !home.trim().is_empty() => expand_tilde(Path::new(home.trim())),
            _ => {
                let user_home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
                Ok(user_home.join(HOME_DIR_NAME))
            }
        }
    }
}

/// Apply `BRICK_*` environment variable overrides
fn apply_env_overrides(mut settings: Settings) -> ConfigResult<Settings> {
    if let Ok(editor) = env::var("BRICK_EDITOR") {
        settings.set("general.editor", &editor)?;
    }

    if let Ok(author) = env::var("BRICK_AUTHOR") {
        settings.set("general.author", &author)?;
    }

    if let Ok(multi) = env::var("BRICK_MULTI_DEVELOP") {
        let value = parse_bool(&multi).ok_or_else(|| ConfigError::InvalidValue {
            field: "BRICK_MULTI_DEVELOP".to_string(),
            reason: format!("expected true or false, got '{}'", multi),
        })?;
        settings.set("general.multi-develop", &value.to_string())?;
    }

    if let Ok(path) = env::var("BRICK_WORKSPACE") {
        settings.set("workspace.path", &path)?;
    }

    if let Ok(cache) = env::var("BRICK_CACHE") {
        settings.set("workspace.cache", &cache)?;
    }

    Ok(settings)
}

fn expand_paths(settings: &mut Settings) -> ConfigResult<()> {
    if let Some(workspace) = settings.workspace.as_mut() {
        if let Some(path) = workspace.path.as_mut() {
            *path = expand_tilde(path)?;
        }
        if let Some(cache) = workspace.cache.as_mut() {
            *cache = expand_tilde(cache)?;
        }
    }
    for vendor in &mut settings.vendors {
        vendor.path = expand_tilde(&vendor.path)?;
    }
    Ok(())
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> ConfigResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
