//! Remove installed copies from the cache (brick uninstall)

use super::{green_check, yellow_warning, Session};
use anyhow::Result;
use brick_package::UninstallOutcome;

/// Arguments for the uninstall command
#[derive(Debug, Clone, Default)]
pub struct UninstallArgs {
    pub block: String,
    /// Only pins matching this prefix (`v1`, `v1.2`, `v1.2.3`)
    pub version: Option<String>,
}

pub fn run(args: UninstallArgs, session: &Session) -> Result<()> {
    let mut ws = session.workspace()?;
    let id = ws.find(&args.block)?;

    match ws.uninstall(&id, args.version.as_deref())? {
        UninstallOutcome::Removed(names) => {
            for name in &names {
                println!("  {} Removed {} {}", green_check(), id, name);
            }
            println!(
                "\nUninstalled {} cop{}",
                names.len(),
                if names.len() == 1 { "y" } else { "ies" }
            );
        }
        UninstallOutcome::Cancelled => println!("{} Cancelled", yellow_warning()),
    }
    Ok(())
}
