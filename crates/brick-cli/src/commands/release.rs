//! Tag and publish a new version of the current block (brick release)

use super::{current_block, green_check, red_cross, Session};
use anyhow::{bail, Context, Result};
use brick_package::{NextVersion, ReleaseOptions};

/// Arguments for the release command
#[derive(Debug, Clone)]
pub struct ReleaseArgs {
    /// `major`, `minor`, `patch` or `vX.Y.Z`
    pub next: String,
    pub message: Option<String>,
    pub dry_run: bool,
    /// Commit only the marker file and changelog
    pub only_meta: bool,
    pub no_install: bool,
    pub skip_changelog: bool,
}

pub fn run(args: ReleaseArgs, session: &Session) -> Result<()> {
    let next: NextVersion = args
        .next
        .parse()
        .with_context(|| format!("Expected major, minor, patch or vX.Y.Z, got '{}'", args.next))?;

    let mut ws = session.workspace()?;
    let block = current_block(&ws)?;

    let options = ReleaseOptions {
        message: args.message,
        dry_run: args.dry_run,
        only_meta: args.only_meta,
        no_install: args.no_install,
        skip_changelog: args.skip_changelog,
        ..ReleaseOptions::new(next)
    };
    let report = ws.release(&block, &options)?;
    println!("{}", report);

    if !report.passed {
        println!("{} Release checks failed", red_cross());
        bail!("Release of {} did not pass", block.key);
    }
    if !report.dry_run {
        println!("{} Released {} {}", green_check(), block.key, report.version);
    }
    Ok(())
}
