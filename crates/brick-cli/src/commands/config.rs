//! Read and write global settings (brick config)

use super::{green_check, Session};
use anyhow::{Context, Result};
use brick_config::Settings;
use colored::Colorize;

#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    pub list: bool,
    pub key: Option<String>,
    pub value: Option<String>,
}

pub fn run(args: ConfigArgs, session: &Session) -> Result<()> {
    let config = &session.config;
    match (args.key, args.value) {
        (Some(key), Some(value)) if !args.list => {
            // env overrides must not leak into the file
            let mut stored = config.stored_settings()?;
            stored.set(&key, &value)?;
            stored
                .save_to_file(&config.path)
                .with_context(|| format!("Failed to write {}", config.path.display()))?;
            println!("{} Set {} = {}", green_check(), key, value);
        }
        (Some(key), None) if !args.list => {
            if let Some(value) = config.settings.get(&key)? {
                println!("{}", value);
            }
        }
        _ => print!("{}", render(&config.settings)),
    }
    Ok(())
}

/// Every setting as `key = value`, then the vendor list.
fn render(settings: &Settings) -> String {
    let mut out = String::new();
    for (key, value) in settings.entries() {
        let value = value.unwrap_or_else(|| "(unset)".dimmed().to_string());
        out.push_str(&format!("{} = {}\n", key, value));
    }
    for vendor in &settings.vendors {
        out.push_str(&format!("vendor {} = {}\n", vendor.name, vendor.path.display()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_every_key() {
        let mut settings = Settings::default();
        settings.set("general.author", "Jane").unwrap();
        let text = render(&settings);
        assert!(text.contains("general.author = Jane\n"));
        assert!(text.contains("workspace.cache = "));
        assert_eq!(text.lines().count(), brick_config::settings::KEYS.len());
    }
}
