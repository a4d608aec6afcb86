//! Install a block into the cache (brick install)

use super::{first_ref, green_check, Session};
use anyhow::{Context, Result};
use brick_package::{BlockRef, Identifier, InstallOutcome, Level, Version, Workspace};

/// Arguments for the install command
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    /// `[vendor.]library.name`
    pub block: String,
    /// Specific release `vX.Y.Z`; latest when absent
    pub version: Option<String>,
}

pub fn run(args: InstallArgs, session: &Session) -> Result<()> {
    let mut ws = session.workspace()?;
    let id = ws.find(&args.block)?;

    let source = first_ref(
        &ws,
        &id,
        &[Level::Downloaded, Level::Available, Level::Installed],
    )
    .with_context(|| format!("Block {} has no copy to install from", args.block))?;

    let spinner = session.spinner(format!("Installing {}...", args.block));
    let result = match &args.version {
        None => ws.install(&source).map_err(anyhow::Error::from),
        Some(text) => install_release(&mut ws, &id, &source, text),
    };
    spinner.finish_and_clear();
    let outcome = result.with_context(|| format!("Failed to install {}", args.block))?;

    match outcome {
        InstallOutcome::Installed {
            block,
            version,
            size_kb,
        } => match block.pin {
            Some(pin) => println!(
                "{} Installed {} {} as {} ({} KB)",
                green_check(),
                block.key,
                version,
                pin,
                size_kb
            ),
            None => println!(
                "{} Installed {} {} ({} KB)",
                green_check(),
                block.key,
                version,
                size_kb
            ),
        },
        InstallOutcome::AlreadyInstalled { version } => {
            println!("{} {} {} is already installed", green_check(), args.block, version)
        }
    }
    Ok(())
}

/// Pin `text`, installing the latest copy first when the cache has none.
fn install_release(
    ws: &mut Workspace,
    id: &Identifier,
    source: &BlockRef,
    text: &str,
) -> Result<InstallOutcome> {
    let version = Version::parse_release(text)?;
    if first_ref(ws, id, &[Level::Installed]).is_none() {
        ws.install(source)?;
    }
    Ok(ws.install_version(id, version)?)
}
